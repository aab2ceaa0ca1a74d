//! Property-based tests using proptest
//!
//! These tests verify name matching, query translation and path
//! rendering using randomized inputs.

use ostack::resource::field::render_path;
use ostack::resource::{get_one_match, Query, QueryParameters, Resource, UriParams};
use ostack::services::network::Network;
use ostack::Error;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn network(id: &str, name: &str) -> Network {
    Network {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Generate a set of distinct network names
fn arb_names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z][a-z0-9-]{0,20}", 1..30)
}

/// Arbitrary path segment values, including reserved characters
fn arb_segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 /?#%&{}=._~-]{1,40}"
}

proptest! {
    /// With unique names, each name resolves to exactly its own network
    #[test]
    fn test_unique_names_match(names in arb_names()) {
        let networks: Vec<Network> = names
            .iter()
            .enumerate()
            .map(|(i, name)| network(&format!("id-{}", i), name))
            .collect();

        for (i, name) in names.iter().enumerate() {
            let found = get_one_match(name, networks.clone()).unwrap().unwrap();
            let expected = format!("id-{}", i);
            prop_assert_eq!(found.id(), Some(expected.as_str()));
        }
    }

    /// Matching by id always works, names aside
    #[test]
    fn test_id_matches(names in arb_names(), pick in any::<prop::sample::Index>()) {
        let networks: Vec<Network> = names
            .iter()
            .enumerate()
            .map(|(i, name)| network(&format!("id-{}", i), name))
            .collect();

        let target = &networks[pick.index(networks.len())];
        let id = target.id().unwrap().to_string();
        let found = get_one_match(&id, networks.clone()).unwrap().unwrap();
        prop_assert_eq!(found, target.clone());
    }

    /// A name shared by two candidates is always a duplicate
    #[test]
    fn test_duplicate_names_rejected(names in arb_names(), pick in any::<prop::sample::Index>()) {
        let mut networks: Vec<Network> = names
            .iter()
            .enumerate()
            .map(|(i, name)| network(&format!("id-{}", i), name))
            .collect();

        let dup = networks[pick.index(networks.len())].name.clone().unwrap();
        networks.push(network("id-dup", &dup));

        prop_assert!(matches!(
            get_one_match(&dup, networks),
            Err(Error::DuplicateResource(_))
        ));
    }

    /// A name nobody has never matches
    #[test]
    fn test_absent_name_is_none(names in arb_names()) {
        let networks: Vec<Network> = names
            .iter()
            .enumerate()
            .map(|(i, name)| network(&format!("id-{}", i), name))
            .collect();

        prop_assert!(get_one_match("NOT-A-NAME", networks).unwrap().is_none());
    }

    /// Mapped filters always go out under their wire name
    #[test]
    fn test_transpose_maps_known_keys(value in "[a-zA-Z0-9]{1,16}", limit in 1usize..1000) {
        let params = QueryParameters::new(&["name"]).with_mapping("all_projects", "all_tenants");
        let query = Query::new()
            .filter("name", &value)
            .filter("all_projects", "true")
            .limit(limit);

        let wire = params.transpose(&query, "Thing").unwrap();
        prop_assert_eq!(wire.get("name").map(String::as_str), Some(value.as_str()));
        prop_assert_eq!(wire.get("all_tenants").map(String::as_str), Some("true"));
        prop_assert_eq!(wire.get("limit").cloned(), Some(limit.to_string()));
        prop_assert!(!wire.contains_key("all_projects"));
    }

    /// Anything outside the accepted set is rejected
    #[test]
    fn test_transpose_rejects_unknown(key in "x_[a-z]{1,10}") {
        let params = QueryParameters::new(&["name", "status"]);
        let query = Query::new().filter(key.clone(), "v");

        let err = params.transpose(&query, "Thing").unwrap_err();
        prop_assert!(matches!(err, Error::InvalidResourceQuery(ref msg) if msg.contains(&key)));
    }

    /// Rendered paths have no placeholders left and values decode back
    #[test]
    fn test_render_path_encodes(value in arb_segment()) {
        let uri = UriParams::new().with("container", value.clone());
        let path = render_path("/{container}/objects", &uri, "Object").unwrap();

        prop_assert!(!path.contains('{'), "path still contains a placeholder: {}", path);
        prop_assert!(path.ends_with("/objects"));

        let encoded = &path[1..path.len() - "/objects".len()];
        prop_assert!(!encoded.contains('/'));
        prop_assert_eq!(urlencoding::decode(encoded).unwrap(), value);
    }
}

#[test]
fn test_render_path_missing_param() {
    let err = render_path("/servers/{server_id}/os-interface", &UriParams::new(), "ServerInterface")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(ref msg) if msg.contains("server_id")));
}

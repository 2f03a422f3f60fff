//! Marker ancestor registry.
//!
//! A class whose header names one of these base types is a class-based test case
//! (run through `manage.py test`). Matching is on the last dotted segment, so
//! `rest_framework.test.APITestCase` and `APITestCase` resolve to the same id.

/// Stable identifier for recognized marker ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerId {
    ApiTestCase,
    ApiTransactionTestCase,
    ApiSimpleTestCase,
    TestCase,
    TransactionTestCase,
    SimpleTestCase,
    LiveServerTestCase,
}

/// Metadata entry for a marker ancestor.
#[derive(Debug, Clone, Copy)]
pub struct MarkerInfo {
    pub id: MarkerId,
    pub canonical: &'static str,
}

/// Registry of marker ancestors.
pub const MARKERS: &[MarkerInfo] = &[
    info(MarkerId::ApiTestCase, "APITestCase"),
    info(MarkerId::ApiTransactionTestCase, "APITransactionTestCase"),
    info(MarkerId::ApiSimpleTestCase, "APISimpleTestCase"),
    info(MarkerId::TestCase, "TestCase"),
    info(MarkerId::TransactionTestCase, "TransactionTestCase"),
    info(MarkerId::SimpleTestCase, "SimpleTestCase"),
    info(MarkerId::LiveServerTestCase, "LiveServerTestCase"),
];

/// Resolve a base type spelling to its marker id.
///
/// Dotted spellings resolve through their last segment.
///
/// ## Examples
/// ```rust
/// use testnav_core::lang::markers::{self, MarkerId};
///
/// assert_eq!(markers::from_str("rest_framework.test.APITestCase"), Some(MarkerId::ApiTestCase));
/// assert_eq!(markers::from_str("object"), None);
/// ```
pub fn from_str(name: &str) -> Option<MarkerId> {
    let last = name.rsplit('.').next().unwrap_or(name).trim();
    MARKERS.iter().find(|m| m.canonical == last).map(|m| m.id)
}

/// Return the canonical spelling for a marker.
pub fn as_str(id: MarkerId) -> &'static str {
    info_for(id).canonical
}

/// Return the metadata entry for a marker.
pub fn info_for(id: MarkerId) -> &'static MarkerInfo {
    match MARKERS.iter().find(|m| m.id == id) {
        Some(info) => info,
        None => unreachable!("every MarkerId has a registry entry"),
    }
}

/// Canonical spellings of every registered marker, in registry order.
pub fn canonical_names() -> impl Iterator<Item = &'static str> {
    MARKERS.iter().map(|m| m.canonical)
}

const fn info(id: MarkerId, canonical: &'static str) -> MarkerInfo {
    MarkerInfo { id, canonical }
}

//! Kind-tagged feature identifiers.

use campusmap_core::FeatureId;
use log::warn;

/// Top two bits encode element type: 00=node, 01=way, 10=relation. Remaining 62 bits carry the raw ID.
const WAY_ID_PREFIX: u64 = 1 << 62;
const REL_ID_PREFIX: u64 = 1 << 63;
const TYPE_ID_MASK: u64 = (1 << 62) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum OsmElementKind {
    Node,
    Way,
    Relation,
}

/// Encode `raw_id` for `kind`, or `None` when the id cannot be represented.
pub(super) fn encode_element_id(kind: OsmElementKind, raw_id: i64) -> Option<u64> {
    let Ok(base) = u64::try_from(raw_id) else {
        warn!("skipped OSM {kind:?} {raw_id}: negative identifiers are unsupported");
        return None;
    };
    if base > TYPE_ID_MASK {
        warn!("skipped OSM {kind:?} {raw_id}: exceeds supported maximum {TYPE_ID_MASK}");
        return None;
    }
    let prefix = match kind {
        OsmElementKind::Node => 0,
        OsmElementKind::Way => WAY_ID_PREFIX,
        OsmElementKind::Relation => REL_ID_PREFIX,
    };
    Some(prefix | base)
}

/// Split an encoded identifier back into its kind and raw OSM id.
pub fn decode_feature_id(id: FeatureId) -> (&'static str, u64) {
    let kind = match id.0 & !TYPE_ID_MASK {
        0 => "node",
        WAY_ID_PREFIX => "way",
        _ => "relation",
    };
    (kind, id.0 & TYPE_ID_MASK)
}

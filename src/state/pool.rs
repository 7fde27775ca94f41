use super::Tables;
use crate::types::SourceKind;

/// One prompt that may land on a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub text: String,
    pub source_kind: SourceKind,
    pub source_id: String,
}

/// Collect every prompt available for `member`'s card in `team_id`.
///
/// Prompts teammates wrote for the member come first, then the member's own
/// personal resolutions. Nothing is deduplicated or capped; the card generator
/// shuffles the pool and leaves any surplus unused.
pub fn build_resolution_pool(tx: &Tables, team_id: &str, member: &str) -> Vec<PoolEntry> {
    let mut provided: Vec<_> = tx
        .provided_resolutions
        .values()
        .filter(|r| r.team_id == team_id && r.to_user_id == member)
        .collect();
    provided.sort_by(|a, b| a.id.cmp(&b.id));

    let mut personal: Vec<_> = tx
        .personal_resolutions
        .values()
        .filter(|r| r.user_id == member)
        .collect();
    personal.sort_by(|a, b| a.id.cmp(&b.id));

    let provided = provided.into_iter().map(|r| PoolEntry {
        text: r.text.clone(),
        source_kind: SourceKind::TeamProvided,
        source_id: r.id.clone(),
    });
    let personal = personal.into_iter().map(|r| PoolEntry {
        text: r.text.clone(),
        source_kind: SourceKind::Personal,
        source_id: r.id.clone(),
    });

    provided.chain(personal).collect()
}

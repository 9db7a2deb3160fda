use scraper::ElementRef;

use crate::markers::{MarkerRole, MarkerVocabulary};
use crate::model::Role;
use crate::segment::turn_tag_role;

/// Assigns a role to one segment, or `None` when the segment cannot be classified.
///
/// Turn tags are authoritative, then marker controls of exactly one role. A segment with no
/// markers at all directly after a user turn is taken as the assistant's reply.
pub fn classify_segment(
    segment: ElementRef<'_>,
    previous: Option<Role>,
    vocabulary: &MarkerVocabulary,
) -> Option<Role> {
    if let Some(role) = turn_tag_role(segment) {
        return Some(role_of(role));
    }

    let has_user = vocabulary.has_marker(segment, MarkerRole::User);
    let has_assistant = vocabulary.has_marker(segment, MarkerRole::Assistant);

    match (has_user, has_assistant) {
        (true, false) => Some(Role::User),
        (false, true) => Some(Role::Assistant),
        (false, false) if previous == Some(Role::User) => Some(Role::Assistant),
        _ => None,
    }
}

fn role_of(role: MarkerRole) -> Role {
    match role {
        MarkerRole::User => Role::User,
        MarkerRole::Assistant => Role::Assistant,
    }
}

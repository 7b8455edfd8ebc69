use caseflow_core::parse_rfc3339;
use caseflow_domain::{Attachment, ChatMessage};

/// Watermark of the latest chat or attachment activity this session has seen.
///
/// Empty values are ignored. When both the stored value and the candidate are RFC 3339
/// timestamps the cursor only moves forward; any other non-empty value is an opaque
/// server token and replaces the stored one whenever it differs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityCursor {
    value: Option<String>,
}

impl ActivityCursor {
    pub fn new(value: Option<String>) -> Self {
        let mut cursor = Self::default();
        cursor.advance(value.as_deref());
        cursor
    }

    /// Seeds from the newest `created_at` / `updated_at` among loaded items.
    pub fn seeded_from(messages: &[ChatMessage], attachments: &[Attachment]) -> Self {
        let stamps = messages
            .iter()
            .flat_map(|message| {
                std::iter::once(message.created_at.as_str()).chain(message.updated_at.as_deref())
            })
            .chain(attachments.iter().flat_map(|attachment| {
                std::iter::once(attachment.created_at.as_str())
                    .chain(attachment.updated_at.as_deref())
            }));

        let mut cursor = Self::default();
        for stamp in stamps {
            cursor.advance(Some(stamp));
        }
        cursor
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns `true` when the cursor moved.
    pub fn advance(&mut self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate.map(str::trim).filter(|value| !value.is_empty()) else {
            return false;
        };
        let moved = match self.value.as_deref() {
            None => true,
            Some(current) => match (parse_rfc3339(candidate), parse_rfc3339(current)) {
                (Some(candidate), Some(current)) => candidate > current,
                _ => candidate != current,
            },
        };
        if moved {
            self.value = Some(candidate.to_owned());
        }
        moved
    }
}

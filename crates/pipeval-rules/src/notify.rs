//! Follow-up contact resolution.

use pipeval_core::{keys, Record};

const EMAIL_PRIORITY: &[&str] = &[keys::EMAIL_NOTIFICACAO, keys::EMAIL, keys::CADASTRADO_POR];
const PHONE_PRIORITY: &[&str] = &[keys::TELEFONE_NOTIFICACAO, keys::TELEFONE_PROPOSTA];

/// `None` means no notification is possible for that channel; it is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyTarget {
    pub email: Option<String>,
    pub phone: Option<String>,
}

fn first_filled(record: &Record, priority: &[&str]) -> Option<String> {
    let value = record.first_of(priority).trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn resolve_notify_target(record: &Record) -> NotifyTarget {
    NotifyTarget {
        email: first_filled(record, EMAIL_PRIORITY),
        phone: first_filled(record, PHONE_PRIORITY),
    }
}

//! Source classification
//!
//! Pure mapping from a single activity signal to an activity category and a
//! work-related flag, driven entirely by the configured lookup tables.
//! Unknown applications and domains never error; every case falls through
//! to a defined default.

use crate::config::{normalize_application, normalize_domain, ClassificationTables};
use crate::types::{ActivityCategory, ActivitySignal, InteractionKind};

/// Result of classifying one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ActivityCategory,
    pub work_related: bool,
}

/// Classify a single signal against the lookup tables.
///
/// Rule order:
/// 1. editor/IDE combined with keyboard or pointer interaction → focused-work
/// 2. conferencing client → meeting
/// 3. browser → research if the domain is work-listed, otherwise personal
/// 4. messaging client → communication
/// 5. any other non-empty application → admin
/// 6. no application: a bare domain is treated as a browser signal,
///    otherwise personal
pub fn classify_signal(signal: &ActivitySignal, tables: &ClassificationTables) -> Classification {
    let app = signal
        .application
        .as_deref()
        .map(normalize_application)
        .filter(|a| !a.is_empty());
    let domain = signal
        .domain
        .as_deref()
        .map(normalize_domain)
        .filter(|d| !d.is_empty());

    let category = match app {
        Some(ref app) if tables.is_editor(app) && is_hands_on(signal.interaction_kind) => {
            ActivityCategory::FocusedWork
        }
        Some(ref app) if tables.is_conferencing(app) => ActivityCategory::Meeting,
        Some(ref app) if tables.is_browser(app) => browse_category(domain.as_deref(), tables),
        Some(ref app) if tables.is_messaging(app) => ActivityCategory::Communication,
        Some(_) => ActivityCategory::Admin,
        None => match domain {
            // Domain without an application still implies a browser
            Some(ref d) => browse_category(Some(d), tables),
            None => ActivityCategory::Personal,
        },
    };

    Classification {
        category,
        work_related: category.is_work_related(),
    }
}

fn is_hands_on(kind: InteractionKind) -> bool {
    matches!(kind, InteractionKind::Keyboard | InteractionKind::Pointer)
}

fn browse_category(domain: Option<&str>, tables: &ClassificationTables) -> ActivityCategory {
    match domain {
        Some(d) if tables.is_work_domain(d) => ActivityCategory::Research,
        _ => ActivityCategory::Personal,
    }
}

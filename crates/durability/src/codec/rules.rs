//! Per-version encoding rules of the tagged record family (versions 8-11).
//!
//! | Ver | Baseline | Precision/Reset | Options | Depth | Checksum |
//! |-----|----------|-----------------|---------|-------|----------|
//! | 8   | zero per record | no | absolute | absolute | not verified |
//! | 9   | running  | no | absolute | absolute | verified |
//! | 10  | running  | yes | absolute | absolute | verified |
//! | 11  | running  | yes | delta | per-level delta | verified |

/// Oldest version with the `[len][ver][checksum][fields]` framing.
pub const FIRST_TAGGED_VERSION: u8 = 8;

/// Version written by the current encoder.
pub const CURRENT_DATA_VERSION: u8 = 11;

/// How one tagged version encodes a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRules {
    /// Data version byte
    pub version: u8,
    /// Differences are taken against the previous record (otherwise against zero)
    pub running_baseline: bool,
    /// Reset and Precision pseudo-fields exist; prices are symbol-scaled
    pub reset_and_precision: bool,
    /// Option fields are differenced against the running baseline
    pub delta_options: bool,
    /// Depth levels are differenced against the running baseline
    pub delta_depth: bool,
    /// Decoder recomputes and compares the record checksum
    pub verify_checksum: bool,
}

impl FormatRules {
    /// Rules of a tagged version, `None` for anything outside 8-11
    pub const fn for_version(version: u8) -> Option<Self> {
        let rules = match version {
            8 => FormatRules {
                version,
                running_baseline: false,
                reset_and_precision: false,
                delta_options: false,
                delta_depth: false,
                verify_checksum: false,
            },
            9 => FormatRules {
                version,
                running_baseline: true,
                reset_and_precision: false,
                delta_options: false,
                delta_depth: false,
                verify_checksum: true,
            },
            10 => FormatRules {
                version,
                running_baseline: true,
                reset_and_precision: true,
                delta_options: false,
                delta_depth: false,
                verify_checksum: true,
            },
            11 => FormatRules {
                version,
                running_baseline: true,
                reset_and_precision: true,
                delta_options: true,
                delta_depth: true,
                verify_checksum: true,
            },
            _ => return None,
        };
        Some(rules)
    }

    /// Rules of the current version
    pub const fn current() -> Self {
        FormatRules {
            version: CURRENT_DATA_VERSION,
            running_baseline: true,
            reset_and_precision: true,
            delta_options: true,
            delta_depth: true,
            verify_checksum: true,
        }
    }
}

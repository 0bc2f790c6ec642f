use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentType {
    Invoice => "invoice",
    Bill => "bill",
    CreditNote => "credit_note",
    ProForma => "pro_forma",
    Receipt => "receipt",
    Expense => "expense",
    Unknown => "unknown",
});

impl DocumentType {
    /// Types whose direction (issued vs received) depends on the tenant.
    pub fn is_directional(&self) -> bool {
        matches!(self, Self::Invoice | Self::Bill)
    }
}

str_enum!(CheckType {
    Math => "math",
    ChecksumOgm => "checksum_ogm",
    ChecksumIban => "checksum_iban",
    VatRate => "vat_rate",
    CompanyExists => "company_exists",
    CompanyName => "company_name",
});

str_enum!(Severity {
    Critical => "critical",
    Warning => "warning",
    Info => "info",
});

str_enum!(AuditStatus {
    Passed => "passed",
    WarningsOnly => "warnings_only",
    Failed => "failed",
});

str_enum!(DecisionOutcome {
    AutoApprove => "auto_approve",
    NeedsReview => "needs_review",
    Reject => "reject",
});

str_enum!(ConflictSeverity {
    Critical => "critical",
    Minor => "minor",
});

str_enum!(ProcessingStage {
    Classification => "classification",
    Extraction => "extraction",
    Validation => "validation",
    Enrichment => "enrichment",
});

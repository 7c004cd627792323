use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same string table so the JSON contract and
/// the SQLite mirror never disagree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
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

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(CourseKind {
    Required => "required",
    Elective => "elective",
});

str_enum!(Program {
    Ai => "AI",
    AiProduct => "AI Product",
});

impl Program {
    pub const ALL: [Program; 2] = [Program::Ai, Program::AiProduct];

    /// File-name-safe form used for `normalized/<slug>.json` and raw PDFs.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::AiProduct => "AI_Product",
        }
    }

    /// Public program page that links to the plan PDF.
    pub fn page_url(&self) -> &'static str {
        match self {
            Self::Ai => "https://abit.itmo.ru/program/master/ai",
            Self::AiProduct => "https://abit.itmo.ru/program/master/ai_product",
        }
    }

    /// Known plan PDF, used when the program page does not expose a link.
    pub fn direct_plan_url(&self) -> &'static str {
        match self {
            Self::Ai => {
                "https://api.itmo.su/constructor-ep/api/v1/static/programs/10033/plan/abit/pdf"
            }
            Self::AiProduct => {
                "https://api.itmo.su/constructor-ep/api/v1/static/programs/10130/plan/abit/pdf"
            }
        }
    }

    /// Lenient parse for CLI input: accepts `AI`, `ai`, `ai-product`, `AI_Product`, ...
    pub fn from_cli(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "ai" => Some(Self::Ai),
            "aiproduct" => Some(Self::AiProduct),
            _ => None,
        }
    }
}

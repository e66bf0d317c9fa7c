use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid enum value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde wire form.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
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
    };
}

str_enum!(LabStatus {
    Bajo => "bajo",
    Normal => "normal",
    Alto => "alto",
});

str_enum!(LabFlag {
    High => "H",
    Low => "L",
});

str_enum!(ChunkStatus {
    Ok => "ok",
    Failed => "failed",
});

impl LabStatus {
    /// Lenient label matching for statuses reported by the extraction model
    /// or typed by a user ("Alto", "high", "LOW", ...).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "bajo" | "baja" | "low" | "l" => Some(Self::Bajo),
            "normal" | "ok" | "dentro de rango" => Some(Self::Normal),
            "alto" | "alta" | "high" | "h" => Some(Self::Alto),
            _ => None,
        }
    }

    /// The flag a lab would print for this status.
    pub fn flag(&self) -> Option<LabFlag> {
        match self {
            Self::Bajo => Some(LabFlag::Low),
            Self::Normal => None,
            Self::Alto => Some(LabFlag::High),
        }
    }
}

impl LabFlag {
    /// Map an OCR glyph (`H`, `L`, `↑`, `↓`) or a spelled-out label to a flag.
    pub fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph.trim() {
            "↑" => Some(Self::High),
            "↓" => Some(Self::Low),
            other => match other.to_lowercase().as_str() {
                "h" | "high" | "alto" => Some(Self::High),
                "l" | "low" | "bajo" => Some(Self::Low),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for status in [LabStatus::Bajo, LabStatus::Normal, LabStatus::Alto] {
            assert_eq!(LabStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn status_serializes_as_spanish_label() {
        let json = serde_json::to_string(&LabStatus::Alto).unwrap();
        assert_eq!(json, "\"alto\"");
    }

    #[test]
    fn flag_serializes_as_letter() {
        let json = serde_json::to_string(&LabFlag::Low).unwrap();
        assert_eq!(json, "\"L\"");
    }

    #[test]
    fn unknown_status_is_error() {
        let err = LabStatus::from_str("critical").unwrap_err();
        assert_eq!(err.field, "LabStatus");
        assert_eq!(err.value, "critical");
    }

    #[test]
    fn lenient_status_labels() {
        assert_eq!(LabStatus::from_label("High"), Some(LabStatus::Alto));
        assert_eq!(LabStatus::from_label(" BAJO "), Some(LabStatus::Bajo));
        assert_eq!(LabStatus::from_label("normal"), Some(LabStatus::Normal));
        assert_eq!(LabStatus::from_label("???"), None);
    }

    #[test]
    fn glyphs_map_to_flags() {
        assert_eq!(LabFlag::from_glyph("↑"), Some(LabFlag::High));
        assert_eq!(LabFlag::from_glyph("↓"), Some(LabFlag::Low));
        assert_eq!(LabFlag::from_glyph("h"), Some(LabFlag::High));
        assert_eq!(LabFlag::from_glyph("*"), None);
    }

    #[test]
    fn status_flag_mapping() {
        assert_eq!(LabStatus::Alto.flag(), Some(LabFlag::High));
        assert_eq!(LabStatus::Bajo.flag(), Some(LabFlag::Low));
        assert_eq!(LabStatus::Normal.flag(), None);
    }
}

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Patient,
	Doctor,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Patient => "patient",
			Self::Doctor => "doctor",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"patient" => Some(Self::Patient),
			"doctor" => Some(Self::Doctor),
			_ => None,
		}
	}
}

//! `Option<OffsetDateTime>` fields. Blank strings read as `None`, so an empty query parameter such
//! as `?before=` is ignored instead of rejected.

use serde::{Deserialize as _, Deserializer, Serializer, de::Error as _};
use time::OffsetDateTime;

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(value) => super::serialize(value, serializer),
		None => serializer.serialize_none(),
	}
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	let Some(raw) = Option::<String>::deserialize(deserializer)? else {
		return Ok(None);
	};

	if raw.trim().is_empty() {
		return Ok(None);
	}

	super::parse(&raw).map(Some).map_err(D::Error::custom)
}

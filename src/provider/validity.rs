//! Validity window strings of the form `hours=1;minutes=2;seconds=3`.
//!
//! Validity is configuration: it is parsed into a relative duration when the
//! configuration is saved, and stamped into an absolute expiry at issuance
//! time. Validation of issued artifacts always compares against that stamped
//! expiry, so later configuration changes never retroactively alter them.

// self
use crate::_prelude::*;

/// Errors produced while parsing validity strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ValidityParseError {
	/// The validity string was empty.
	#[error("Validity string cannot be empty.")]
	Empty,
	/// A segment was not a `unit=value` pair.
	#[error("Validity segment `{segment}` is not a unit=value pair.")]
	MalformedSegment {
		/// The offending segment.
		segment: String,
	},
	/// The unit name is not recognized.
	#[error("Unknown validity unit `{unit}`.")]
	UnknownUnit {
		/// The offending unit name.
		unit: String,
	},
	/// The value is not a valid integer.
	#[error("Validity value `{value}` is not an integer.")]
	InvalidValue {
		/// The offending value.
		value: String,
	},
}

/// Parsed validity window retaining the raw configuration string.
///
/// Serializes as the raw string so configuration round-trips untouched.
/// Negative values are permitted (SAML `NotBefore` drift windows point into
/// the past).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Validity {
	raw: String,
	duration: Duration,
}
impl Validity {
	/// Parses a validity string eagerly so malformed configuration fails at
	/// save time, not at issuance.
	pub fn parse(raw: impl Into<String>) -> Result<Self, ValidityParseError> {
		let raw = raw.into();
		let duration = parse_duration(&raw)?;

		Ok(Self { raw, duration })
	}

	/// The parsed relative duration.
	pub fn duration(&self) -> Duration {
		self.duration
	}

	/// Computes the absolute instant `base + validity`.
	pub fn from_instant(&self, base: OffsetDateTime) -> OffsetDateTime {
		base + self.duration
	}

	/// The raw configuration string.
	pub fn raw(&self) -> &str {
		&self.raw
	}
}
impl Display for Validity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.raw)
	}
}
impl FromStr for Validity {
	type Err = ValidityParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl TryFrom<String> for Validity {
	type Error = ValidityParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
impl From<Validity> for String {
	fn from(value: Validity) -> Self {
		value.raw
	}
}

fn parse_duration(raw: &str) -> Result<Duration, ValidityParseError> {
	if raw.trim().is_empty() {
		return Err(ValidityParseError::Empty);
	}

	let mut total = Duration::ZERO;

	for segment in raw.split(';') {
		let segment = segment.trim();

		if segment.is_empty() {
			continue;
		}

		let (unit, value) = segment
			.split_once('=')
			.ok_or_else(|| ValidityParseError::MalformedSegment { segment: segment.into() })?;
		let amount: i64 = value
			.trim()
			.parse()
			.map_err(|_| ValidityParseError::InvalidValue { value: value.into() })?;
		let delta = match unit.trim() {
			"seconds" => Duration::seconds(amount),
			"minutes" => Duration::minutes(amount),
			"hours" => Duration::hours(amount),
			"days" => Duration::days(amount),
			"weeks" => Duration::weeks(amount),
			other => return Err(ValidityParseError::UnknownUnit { unit: other.into() }),
		};

		total += delta;
	}

	Ok(total)
}

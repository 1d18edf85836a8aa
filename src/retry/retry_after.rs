//! `Retry-After` header parsing (delay-seconds or HTTP-date).

// crates.io
use time::{
	PrimitiveDateTime, format_description::well_known::Rfc2822, macros::format_description,
};
// self
use crate::_prelude::*;

/// Failure raised when a `Retry-After` value matches neither accepted form.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RetryAfterError {
	/// The value is neither a non-negative integer nor an HTTP-date.
	#[error("Retry-After value `{value}` is neither delay-seconds nor an HTTP-date.")]
	InvalidFormat {
		/// Offending header value.
		value: String,
	},
}

/// Parses a `Retry-After` value relative to the current UTC clock.
pub fn parse_retry_after(raw: &str) -> Result<StdDuration, RetryAfterError> {
	parse_retry_after_at(raw, OffsetDateTime::now_utc())
}

/// Parses a `Retry-After` value relative to `now`.
///
/// Delay-seconds are tried first, then HTTP-date; the first form that parses wins. Dates in
/// the past yield a zero delay.
pub fn parse_retry_after_at(
	raw: &str,
	now: OffsetDateTime,
) -> Result<StdDuration, RetryAfterError> {
	let raw = raw.trim();

	parse_seconds(raw)
		.or_else(|| parse_http_date(raw, now))
		.ok_or_else(|| RetryAfterError::InvalidFormat { value: raw.to_owned() })
}

/// Reads and parses the `Retry-After` header, if present.
pub fn retry_after_header(headers: &HeaderMap) -> Option<Result<StdDuration, RetryAfterError>> {
	let value = headers.get(reqwest::header::RETRY_AFTER)?;

	Some(match value.to_str() {
		Ok(raw) => parse_retry_after(raw),
		Err(_) => Err(RetryAfterError::InvalidFormat {
			value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
		}),
	})
}

fn parse_seconds(raw: &str) -> Option<StdDuration> {
	raw.parse::<u64>().ok().map(StdDuration::from_secs)
}

fn parse_http_date(raw: &str, now: OffsetDateTime) -> Option<StdDuration> {
	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok().or_else(|| {
		let imf_fixdate = format_description!(
			"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
		);

		PrimitiveDateTime::parse(raw, &imf_fixdate).ok().map(PrimitiveDateTime::assume_utc)
	})?;

	Some(StdDuration::try_from(moment - now).unwrap_or(StdDuration::ZERO))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn delay_seconds_are_accepted() {
		assert_eq!(parse_retry_after("120"), Ok(StdDuration::from_secs(120)));
		assert_eq!(parse_retry_after(" 0 "), Ok(StdDuration::ZERO));
	}

	#[test]
	fn http_dates_yield_time_remaining() {
		let now = macros::datetime!(2015-10-21 07:28:00 UTC);

		assert_eq!(
			parse_retry_after_at("Wed, 21 Oct 2015 07:30:00 GMT", now),
			Ok(StdDuration::from_secs(120))
		);
		assert_eq!(
			parse_retry_after_at("Wed, 21 Oct 2015 07:20:00 GMT", now),
			Ok(StdDuration::ZERO)
		);
	}

	#[test]
	fn other_values_are_rejected() {
		for raw in ["-5", "soon", "1.5", ""] {
			assert_eq!(
				parse_retry_after(raw),
				Err(RetryAfterError::InvalidFormat { value: raw.to_owned() })
			);
		}
	}

	#[test]
	fn header_lookup_is_optional() {
		let mut headers = HeaderMap::new();

		assert!(retry_after_header(&headers).is_none());

		headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("3"));

		assert_eq!(retry_after_header(&headers), Some(Ok(StdDuration::from_secs(3))));
	}
}

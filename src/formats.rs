use std::{
    collections::HashMap,
    net::{Ipv4Addr, Ipv6Addr},
};

use once_cell::sync::Lazy;

/// Defines format for `format` keyword.
#[derive(Clone, Copy)]
pub struct Format {
    /// Name of the format
    pub name: &'static str,

    /// reports whether the string satisfies the format
    pub func: fn(s: &str) -> bool,
}

pub(crate) static FORMATS: Lazy<HashMap<&'static str, Format>> = Lazy::new(|| {
    let mut m = HashMap::<&'static str, Format>::new();
    let mut register = |name, func| m.insert(name, Format { name, func });
    register("regex", is_regex);
    register("ipv4", is_ipv4);
    register("ipv6", is_ipv6);
    register("hostname", is_hostname);
    register("email", is_email);
    register("date", is_date);
    register("time", is_time);
    register("date-time", is_date_time);
    register("duration", is_duration);
    register("json-pointer", is_json_pointer);
    register("relative-json-pointer", is_relative_json_pointer);
    register("uuid", is_uuid);
    register("uri", is_uri);
    register("uri-reference", is_uri_reference);
    m
});

pub fn is_regex(s: &str) -> bool {
    regex::Regex::new(s).is_ok()
}

pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

pub fn is_ipv6(s: &str) -> bool {
    s.parse::<Ipv6Addr>().is_ok()
}

fn matches_char(s: &str, index: usize, ch: char) -> bool {
    s.is_char_boundary(index) && s[index..].starts_with(ch)
}

// see https://datatracker.ietf.org/doc/html/rfc3339#section-5.6
pub fn is_date(s: &str) -> bool {
    // yyyy-mm-dd
    if s.len() != 10 {
        return false;
    }
    if !matches_char(s, 4, '-') || !matches_char(s, 7, '-') {
        return false;
    }

    let mut ymd = s.splitn(3, '-').filter_map(|t| t.parse::<usize>().ok());
    let (Some(y), Some(m), Some(d)) = (ymd.next(), ymd.next(), ymd.next()) else {
        return false;
    };

    if !matches!(m, 1..=12) || !matches!(d, 1..=31) {
        return false;
    }

    match m {
        2 => {
            let mut feb_days = 28;
            if y % 4 == 0 && (y % 100 != 0 || y % 400 == 0) {
                feb_days += 1; // leap year
            };
            d <= feb_days
        }
        4 | 6 | 9 | 11 => d <= 30,
        _ => true,
    }
}

pub fn is_time(mut str: &str) -> bool {
    // min: hh:mm:ssZ
    if str.len() < 9 {
        return false;
    }
    if !matches_char(str, 2, ':') || !matches_char(str, 5, ':') {
        return false;
    }

    // parse hh:mm:ss
    if !str.is_char_boundary(8) {
        return false;
    }
    let mut hms = (str[..8])
        .splitn(3, ':')
        .filter_map(|t| t.parse::<usize>().ok());
    let (Some(mut h), Some(mut m), Some(s)) = (hms.next(), hms.next(), hms.next()) else {
        return false;
    };
    if h > 23 || m > 59 || s > 60 {
        return false;
    }
    str = &str[8..];

    // parse sec-frac if present
    if let Some(rem) = str.strip_prefix('.') {
        let n_digits = rem.chars().take_while(char::is_ascii_digit).count();
        if n_digits == 0 {
            return false;
        }
        str = &rem[n_digits..];
    }

    if str != "z" && str != "Z" {
        // parse time-numoffset
        if str.len() != 6 {
            return false;
        }
        let sign: isize = match str.chars().next() {
            Some('+') => -1,
            Some('-') => 1,
            _ => return false,
        };
        str = &str[1..];
        if !matches_char(str, 2, ':') {
            return false;
        }

        let mut zhm = str.splitn(2, ':').filter_map(|t| t.parse::<usize>().ok());
        let (Some(zh), Some(zm)) = (zhm.next(), zhm.next()) else {
            return false;
        };
        if zh > 23 || zm > 59 {
            return false;
        }

        // apply timezone
        let mut hm = (h * 60 + m) as isize + sign * (zh * 60 + zm) as isize;
        if hm < 0 {
            hm += 24 * 60;
        }
        let hm = hm as usize;
        (h, m) = (hm / 60, hm % 60);
    }

    // check leapsecond
    s < 60 || (h == 23 && m == 59)
}

pub fn is_date_time(s: &str) -> bool {
    // min: yyyy-mm-ddThh:mm:ssZ
    if s.len() < 20 {
        return false;
    }
    if !s.is_char_boundary(10) || !s[10..].starts_with(|c| matches!(c, 't' | 'T')) {
        return false;
    }
    is_date(&s[..10]) && is_time(&s[11..])
}

// see https://datatracker.ietf.org/doc/html/rfc3339#appendix-A
pub fn is_duration(s: &str) -> bool {
    // must start with 'P'
    let Some(s) = s.strip_prefix('P') else {
        return false;
    };
    if s.is_empty() {
        return false;
    }

    // dur-week
    if let Some(s) = s.strip_suffix('W') {
        return !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    }

    static UNITS: [&str; 2] = ["YMD", "HMS"];
    for (i, s) in s.split('T').enumerate() {
        let mut s = s;
        if i != 0 && s.is_empty() {
            return false;
        }
        let Some(mut units) = UNITS.get(i).cloned() else {
            return false; // more than one T
        };
        while !s.is_empty() {
            let digit_count = s.chars().take_while(char::is_ascii_digit).count();
            if digit_count == 0 {
                return false;
            }
            s = &s[digit_count..];
            let Some(unit) = s.chars().next() else {
                return false;
            };
            let Some(j) = units.find(unit) else {
                return false; // invalid unit, or out of order
            };
            units = &units[j + 1..];
            s = &s[1..];
        }
    }

    true
}

// see https://en.wikipedia.org/wiki/Hostname#Restrictions_on_valid_host_names
pub fn is_hostname(mut s: &str) -> bool {
    // entire hostname (including the delimiting dots but not a trailing
    // dot) has a maximum of 253 ASCII characters
    s = s.strip_suffix('.').unwrap_or(s);
    if s.len() > 253 {
        return false;
    }

    // hostnames are composed of a series of labels concatenated with dots
    s.split('.').all(|label| {
        // each label must be from 1 to 63 characters long,
        // must not start or end with a hyphen, and may contain
        // only ascii letters, digits and hyphen
        matches!(label.len(), 1..=63)
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-'))
    })
}

// see https://en.wikipedia.org/wiki/Email_address
pub fn is_email(s: &str) -> bool {
    // entire email address to be no more than 254 characters long
    if s.len() > 254 {
        return false;
    }

    // email address is generally recognized as having two parts joined
    // with an at-sign
    let Some(at) = s.rfind('@') else {
        return false;
    };
    let (local, domain) = (&s[..at], &s[at + 1..]);

    // local part may be up to 64 characters long
    if local.len() > 64 {
        return false;
    }

    if local.starts_with('"') && local.ends_with('"') {
        // quoted
        let local = &local[1..local.len() - 1];
        if local.contains(|c| matches!(c, '\\' | '"')) {
            return false;
        }
    } else {
        // unquoted
        if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
            return false;
        }
        if !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+-/=?^_`{|}~".contains(c))
        {
            return false;
        }
    }

    // domain if enclosed in brackets, must match an IP address
    if domain.starts_with('[') && domain.ends_with(']') {
        let s = &domain[1..domain.len() - 1];
        if let Some(s) = s.strip_prefix("IPv6:") {
            return s.parse::<Ipv6Addr>().is_ok();
        }
        return s.parse::<Ipv4Addr>().is_ok();
    }

    // domain must match the requirements for a hostname
    is_hostname(domain)
}

// see https://www.rfc-editor.org/rfc/rfc6901#section-3
pub fn is_json_pointer(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if !s.starts_with('/') {
        return false;
    }
    for token in s.split('/').skip(1) {
        let mut chars = token.chars();
        while let Some(ch) = chars.next() {
            if ch == '~' {
                if !matches!(chars.next(), Some('0' | '1')) {
                    return false;
                }
            } else if !matches!(ch, '\x00'..='\x2E' | '\x30'..='\x7D' | '\x7F'..='\u{10FFFF}') {
                return false;
            }
        }
    }
    true
}

// see https://tools.ietf.org/html/draft-handrews-relative-json-pointer-01#section-3
pub fn is_relative_json_pointer(s: &str) -> bool {
    // start with non-negative-integer
    let num_digits = s.chars().take_while(char::is_ascii_digit).count();
    if num_digits == 0 || (num_digits > 1 && s.starts_with('0')) {
        return false;
    }
    let s = &s[num_digits..];

    // followed by either json-pointer or '#'
    s == "#" || is_json_pointer(s)
}

// see https://datatracker.ietf.org/doc/html/rfc4122#page-4
pub fn is_uuid(s: &str) -> bool {
    static HEX_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let mut i = 0;
    for group in s.split('-') {
        if i >= HEX_GROUPS.len()
            || group.len() != HEX_GROUPS[i]
            || !group.chars().all(|c| c.is_ascii_hexdigit())
        {
            return false;
        }
        i += 1;
    }
    i == HEX_GROUPS.len()
}

pub fn is_uri(s: &str) -> bool {
    match fluent_uri::Uri::parse(s) {
        Ok(uri) => !uri.is_relative(),
        Err(_) => false,
    }
}

pub fn is_uri_reference(s: &str) -> bool {
    fluent_uri::Uri::parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date() {
        assert!(is_date("2023-01-31"));
        assert!(is_date("2020-02-29")); // leap year
        assert!(!is_date("2021-02-29"));
        assert!(!is_date("2023-04-31"));
        assert!(!is_date("2023-13-01"));
        assert!(!is_date("23-01-01"));
    }

    #[test]
    fn test_time() {
        assert!(is_time("20:20:39Z"));
        assert!(is_time("20:20:39+05:30"));
        assert!(is_time("23:59:60Z")); // leap second
        assert!(!is_time("08:30:06 PST"));
        assert!(!is_time("24:00:00Z"));
        assert!(!is_time("12:00:60Z"));
    }

    #[test]
    fn test_date_time() {
        assert!(is_date_time("2023-01-31T20:20:39Z"));
        assert!(is_date_time("2023-01-31t20:20:39+05:30"));
        assert!(!is_date_time("2023-01-31 20:20:39Z"));
    }

    #[test]
    fn test_duration() {
        assert!(is_duration("P1Y2M3DT4H5M6S"));
        assert!(is_duration("P4W"));
        assert!(is_duration("PT5M"));
        assert!(!is_duration("P"));
        assert!(!is_duration("P1S")); // time unit without T
        assert!(!is_duration("P1M2Y")); // out of order
    }

    #[test]
    fn test_hostname() {
        assert!(is_hostname("example.com"));
        assert!(is_hostname("example.com."));
        assert!(!is_hostname("-example.com"));
        assert!(!is_hostname("exa_mple.com"));
    }

    #[test]
    fn test_email() {
        assert!(is_email("joe@example.com"));
        assert!(is_email("\"joe bloggs\"@example.com"));
        assert!(is_email("joe@[127.0.0.1]"));
        assert!(!is_email("joe.example.com"));
        assert!(!is_email("joe..bloggs@example.com"));
    }

    #[test]
    fn test_json_pointer() {
        assert!(is_json_pointer(""));
        assert!(is_json_pointer("/a/b~0c/3"));
        assert!(!is_json_pointer("a/b"));
        assert!(!is_json_pointer("/a/~2"));
    }

    #[test]
    fn test_relative_json_pointer() {
        assert!(is_relative_json_pointer("0"));
        assert!(is_relative_json_pointer("1/a"));
        assert!(is_relative_json_pointer("2#"));
        assert!(!is_relative_json_pointer("/a"));
        assert!(!is_relative_json_pointer("01"));
    }

    #[test]
    fn test_uuid() {
        assert!(is_uuid("3e4666bf-d5e5-4aa7-b8ce-cefe41c7568a"));
        assert!(!is_uuid("3e4666bf-d5e5-4aa7-b8ce"));
        assert!(!is_uuid("3e4666bf-d5e5-4aa7-b8ce-cefe41c7568g"));
    }

    #[test]
    fn test_uri() {
        assert!(is_uri("http://example.com/path?q=1#frag"));
        assert!(!is_uri("/relative/path"));
        assert!(is_uri_reference("/relative/path"));
        assert!(!is_uri_reference("\\bad"));
    }
}

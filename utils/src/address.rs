/// Checks a strict dotted-quad IPv4 address: four decimal octets in
/// `0..=255`, no leading zeros, nothing else. Returns the reason on failure.
pub fn validate_ipv4(address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("address is empty".to_string());
    }
    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("expected 4 octets, found {}", octets.len()));
    }
    for (position, octet) in octets.iter().enumerate() {
        let position = position + 1;
        if octet.is_empty() {
            return Err(format!("octet {} is empty", position));
        }
        if !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("octet {} ('{}') is not a decimal number", position, octet));
        }
        if octet.len() > 1 && octet.starts_with('0') {
            return Err(format!("octet {} ('{}') has a leading zero", position, octet));
        }
        if octet.len() > 3 || octet.parse::<u16>().map(|v| v > 255).unwrap_or(true) {
            return Err(format!("octet {} ('{}') is greater than 255", position, octet));
        }
    }
    Ok(())
}

/// RFC 1123 label as used for namespace names.
pub fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    alnum(&bytes[0])
        && alnum(&bytes[bytes.len() - 1])
        && bytes.iter().all(|b| alnum(b) || *b == b'-')
}

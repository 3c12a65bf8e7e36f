pub fn hex_bytes(data: &[u8]) -> String {
    let strs: Vec<String> = data.iter().map(|b| format!("{:02X}", b)).collect();
    strs.join("")
}

pub fn hex_bytes_separated(data: &[u8], sep: char) -> String {
    let strs: Vec<String> = data.iter().map(|b| format!("{:02X}", b)).collect();
    strs.join(&sep.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_format_bytes() {
        assert_eq!("B80500", hex_bytes(&[0xB8, 0x05, 0x00]));
        assert_eq!("F3 A4", hex_bytes_separated(&[0xF3, 0xA4], ' '));
        assert_eq!("", hex_bytes(&[]));
    }
}

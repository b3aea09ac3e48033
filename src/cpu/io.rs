//! Memory-mapped I/O register map.
//!
//! Addresses are data-space addresses as on the ATmega328P, where the I/O
//! registers sit at 0x20 above their `IN`/`OUT` port numbers.

/// Port B input pins.
pub const PINB: u8 = 0x23;
/// Port B data direction.
pub const DDRB: u8 = 0x24;
/// Port B data register.
pub const PORTB: u8 = 0x25;
pub const PINC: u8 = 0x26;
pub const DDRC: u8 = 0x27;
pub const PORTC: u8 = 0x28;
pub const PIND: u8 = 0x29;
pub const DDRD: u8 = 0x2A;
pub const PORTD: u8 = 0x2B;

/// Named I/O registers in address order.
pub const IO_REGISTERS: [(&str, u8); 9] = [
    ("PINB", PINB),
    ("DDRB", DDRB),
    ("PORTB", PORTB),
    ("PINC", PINC),
    ("DDRC", DDRC),
    ("PORTC", PORTC),
    ("PIND", PIND),
    ("DDRD", DDRD),
    ("PORTD", PORTD),
];

/// Address of a named I/O register (case-insensitive).
pub fn io_address(name: &str) -> Option<u8> {
    IO_REGISTERS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, addr)| addr)
}

/// Name of the I/O register at `addr`, if it has one.
pub fn io_name(addr: u8) -> Option<&'static str> {
    IO_REGISTERS
        .iter()
        .find(|&&(_, a)| a == addr)
        .map(|&(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_ways() {
        assert_eq!(io_address("ddrb"), Some(0x24));
        assert_eq!(io_name(0x25), Some("PORTB"));
        assert_eq!(io_address("SREG"), None);
        assert_eq!(io_name(0x00), None);
    }
}

//! Packet-number generator: hands out strictly monotonic packet numbers
//! for one packet-number space.

#[derive(Debug, Default)]
pub struct PacketNumberGenerator {
    next: u64,
}

impl PacketNumberGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn peek(&self) -> u64 {
        self.next
    }

    pub fn generate(&mut self) -> u64 {
        let pn = self.next;
        self.next += 1;
        pn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_strictly_increasing() {
        let mut gen = PacketNumberGenerator::new();
        let a = gen.generate();
        let b = gen.generate();
        let c = gen.generate();
        assert!(a < b && b < c);
        assert_eq!((a, b, c), (0, 1, 2));
    }
}

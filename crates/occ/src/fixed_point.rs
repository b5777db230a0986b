/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/// Decodes an OCC fixed point factor: the upper 24 bits are an unsigned
/// mantissa and the low byte a signed power of ten.
pub fn fixed_point(raw: u32) -> f64 {
    let mantissa = f64::from(raw >> 8);
    let exponent = (raw & 0xFF) as u8 as i8;

    mantissa * 10f64.powi(i32::from(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_factor() {
        assert_eq!(fixed_point(0x100), 1.0);
    }

    #[test]
    fn positive_and_negative_exponents() {
        assert_eq!(fixed_point(0x0A_01), 100.0);
        assert_eq!(fixed_point(0x01_FF), 0.1);
        assert!((fixed_point(0x19_FD) - 0.025).abs() < 1e-12);
    }

    #[test]
    fn zero_mantissa() {
        assert_eq!(fixed_point(0x00_05), 0.0);
    }
}

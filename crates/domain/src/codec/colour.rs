//! Colour temperature approximation.

use crate::command::Rgb;

/// Lowest colour temperature accepted from devices.
pub const KELVIN_MIN: u16 = 2000;
/// Highest colour temperature accepted from devices.
pub const KELVIN_MAX: u16 = 7143;

/// Approximate the RGB colour of a black body at `kelvin`.
#[must_use]
pub fn kelvin_to_rgb(kelvin: u16) -> Rgb {
    let temp = f64::from(kelvin) / 100.0;

    let red = if temp <= 66.0 {
        255.0
    } else {
        329.698_727_446 * (temp - 60.0).powf(-0.133_204_759_2)
    };

    let green = if temp <= 66.0 {
        99.470_802_586_1 * temp.ln() - 161.119_568_166_1
    } else {
        288.122_169_528_3 * (temp - 60.0).powf(-0.075_514_849_2)
    };

    let blue = if temp >= 66.0 {
        255.0
    } else if temp <= 19.0 {
        0.0
    } else {
        138.517_731_223_1 * (temp - 10.0).ln() - 305.044_792_730_7
    };

    Rgb::new(channel(red), channel(green), channel(blue))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_be_white_at_6600k() {
        assert_eq!(kelvin_to_rgb(6600), Rgb::new(255, 255, 255));
    }

    #[test]
    fn should_be_warm_at_2000k() {
        assert_eq!(kelvin_to_rgb(2000), Rgb::new(255, 137, 14));
    }

    #[test]
    fn should_be_blueish_above_6600k() {
        let rgb = kelvin_to_rgb(KELVIN_MAX);
        assert!(rgb.r < 255);
        assert_eq!(rgb.b, 255);
    }
}

use nom::number::complete::{be_u16, be_u32};
use nom::IResult;

pub struct Utils;

impl Utils {
    pub fn round(x: f64, decimals: u32) -> f64 {
        let y = 10i64.pow(decimals) as f64;
        (x * y).round() / y
    }

    pub fn be_u16_div10(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_u16(input)?;
        Ok((input, num as f64 / 10.0))
    }

    pub fn be_u16_div100(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_u16(input)?;
        Ok((input, num as f64 / 100.0))
    }

    // two big-endian words, hi * 65536 + lo
    pub fn be_u32_div10(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_u32(input)?;
        Ok((input, num as f64 / 10.0))
    }

    // operating time is counted in half-seconds
    pub fn be_u32_div7200(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_u32(input)?;
        Ok((input, num as f64 / 7200.0))
    }
}

//! X12 envelope control segments (ISA/IEA, GS/GE, ST/SE)
//!
//! Typed views of the envelope headers plus the close-segment checks the
//! hierarchical parser runs when an envelope level is popped. Every opening
//! control segment must be closed by its counterpart with an agreeing
//! control number and member count.

use crate::tokenizer::Segment;
use crate::{Error, Result};

/// Interchange header (ISA) fields the engine needs
#[derive(Debug, Clone)]
pub struct InterchangeHeader {
    /// Sender identification (ISA06, padding trimmed)
    pub sender: String,
    /// Receiver identification (ISA08, padding trimmed)
    pub receiver: String,
    /// Interchange control number (ISA13)
    pub control_number: String,
    /// Usage indicator (ISA15, "T" test / "P" production)
    pub usage_indicator: String,
}

/// Functional group header (GS) fields the engine needs
#[derive(Debug, Clone)]
pub struct GroupHeader {
    /// Functional identifier code (GS01, e.g. "HC")
    pub functional_code: String,
    /// Group control number (GS06)
    pub control_number: String,
}

/// Transaction set header (ST) fields the engine needs
#[derive(Debug, Clone)]
pub struct TransactionHeader {
    /// Transaction set identifier (ST01, e.g. "837")
    pub set_id: String,
    /// Transaction set control number (ST02)
    pub control_number: String,
}

fn required_value(segment: &Segment, index: usize, what: &str) -> Result<String> {
    segment
        .value(index)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Envelope {
            segment_index: segment.position.index,
            reason: format!("{} segment is missing {what} (element {index})", segment.id),
        })
}

/// Parse an ISA segment into a typed header
pub fn parse_isa(segment: &Segment) -> Result<InterchangeHeader> {
    if segment.elements.len() < 16 {
        return Err(Error::Envelope {
            segment_index: segment.position.index,
            reason: format!(
                "ISA segment must have 16 elements, got {}",
                segment.elements.len()
            ),
        });
    }

    Ok(InterchangeHeader {
        sender: required_value(segment, 6, "sender identification")?,
        receiver: required_value(segment, 8, "receiver identification")?,
        control_number: required_value(segment, 13, "interchange control number")?,
        usage_indicator: required_value(segment, 15, "usage indicator")?,
    })
}

/// Parse a GS segment into a typed header
pub fn parse_gs(segment: &Segment) -> Result<GroupHeader> {
    if segment.elements.len() < 6 {
        return Err(Error::Envelope {
            segment_index: segment.position.index,
            reason: format!(
                "GS segment must have at least 6 elements, got {}",
                segment.elements.len()
            ),
        });
    }

    Ok(GroupHeader {
        functional_code: required_value(segment, 1, "functional identifier code")?,
        control_number: required_value(segment, 6, "group control number")?,
    })
}

/// Parse an ST segment into a typed header
pub fn parse_st(segment: &Segment) -> Result<TransactionHeader> {
    if segment.elements.len() < 2 {
        return Err(Error::Envelope {
            segment_index: segment.position.index,
            reason: format!(
                "ST segment must have at least 2 elements, got {}",
                segment.elements.len()
            ),
        });
    }

    Ok(TransactionHeader {
        set_id: required_value(segment, 1, "transaction set identifier")?,
        control_number: required_value(segment, 2, "transaction control number")?,
    })
}

/// Validate an IEA trailer against its ISA header
pub fn check_iea(header: &InterchangeHeader, segment: &Segment, group_count: usize) -> Result<()> {
    let declared_count = required_value(segment, 1, "included group count")?;
    let control = required_value(segment, 2, "interchange control number")?;

    if control != header.control_number {
        return Err(Error::ControlMismatch {
            open_segment: "ISA",
            close_segment: "IEA",
            segment_index: segment.position.index,
            reason: format!(
                "control number '{control}' does not match '{}'",
                header.control_number
            ),
        });
    }

    if declared_count.parse::<usize>().ok() != Some(group_count) {
        return Err(Error::ControlMismatch {
            open_segment: "ISA",
            close_segment: "IEA",
            segment_index: segment.position.index,
            reason: format!("declared {declared_count} groups, found {group_count}"),
        });
    }

    Ok(())
}

/// Validate a GE trailer against its GS header
pub fn check_ge(header: &GroupHeader, segment: &Segment, transaction_count: usize) -> Result<()> {
    let declared_count = required_value(segment, 1, "included transaction count")?;
    let control = required_value(segment, 2, "group control number")?;

    if control != header.control_number {
        return Err(Error::ControlMismatch {
            open_segment: "GS",
            close_segment: "GE",
            segment_index: segment.position.index,
            reason: format!(
                "control number '{control}' does not match '{}'",
                header.control_number
            ),
        });
    }

    if declared_count.parse::<usize>().ok() != Some(transaction_count) {
        return Err(Error::ControlMismatch {
            open_segment: "GS",
            close_segment: "GE",
            segment_index: segment.position.index,
            reason: format!("declared {declared_count} transactions, found {transaction_count}"),
        });
    }

    Ok(())
}

/// Validate an SE trailer against its ST header.
///
/// `segment_count` is the number of segments from ST through SE inclusive.
pub fn check_se(header: &TransactionHeader, segment: &Segment, segment_count: usize) -> Result<()> {
    let declared_count = required_value(segment, 1, "included segment count")?;
    let control = required_value(segment, 2, "transaction control number")?;

    if control != header.control_number {
        return Err(Error::ControlMismatch {
            open_segment: "ST",
            close_segment: "SE",
            segment_index: segment.position.index,
            reason: format!(
                "control number '{control}' does not match '{}'",
                header.control_number
            ),
        });
    }

    if declared_count.parse::<usize>().ok() != Some(segment_count) {
        return Err(Error::ControlMismatch {
            open_segment: "ST",
            close_segment: "SE",
            segment_index: segment.position.index,
            reason: format!("declared {declared_count} segments, found {segment_count}"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Delimiters;
    use crate::tokenizer::SegmentTokenizer;

    fn segment(data: &[u8]) -> Segment {
        let delims = Delimiters {
            segment: b'~',
            element: b'*',
            component: b':',
            repetition: b'^',
        };
        SegmentTokenizer::new(data, delims)
            .next()
            .unwrap()
            .unwrap()
    }

    fn sample_isa_segment() -> Segment {
        segment(
            b"ISA*00*          *00*          *ZZ*SUBMITTERID    *ZZ*RECEIVERID     *260201*1253*^*00501*000000905*0*T*:~",
        )
    }

    #[test]
    fn test_parse_isa_trims_padding() {
        let header = parse_isa(&sample_isa_segment()).unwrap();
        assert_eq!(header.sender, "SUBMITTERID");
        assert_eq!(header.receiver, "RECEIVERID");
        assert_eq!(header.control_number, "000000905");
        assert_eq!(header.usage_indicator, "T");
    }

    #[test]
    fn test_parse_isa_too_few_elements() {
        let seg = segment(b"ISA*00*          *00~");
        assert!(matches!(parse_isa(&seg), Err(Error::Envelope { .. })));
    }

    #[test]
    fn test_parse_gs() {
        let seg = segment(b"GS*HC*SUBMITTERID*RECEIVERID*20260201*1253*1*X*005010X222A1~");
        let header = parse_gs(&seg).unwrap();
        assert_eq!(header.functional_code, "HC");
        assert_eq!(header.control_number, "1");
    }

    #[test]
    fn test_parse_st() {
        let seg = segment(b"ST*837*0001*005010X222A1~");
        let header = parse_st(&seg).unwrap();
        assert_eq!(header.set_id, "837");
        assert_eq!(header.control_number, "0001");
    }

    #[test]
    fn test_check_iea_matches() {
        let header = parse_isa(&sample_isa_segment()).unwrap();
        let iea = segment(b"IEA*1*000000905~");
        assert!(check_iea(&header, &iea, 1).is_ok());
    }

    #[test]
    fn test_check_iea_control_mismatch() {
        let header = parse_isa(&sample_isa_segment()).unwrap();
        let iea = segment(b"IEA*1*000000906~");

        let err = check_iea(&header, &iea, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::ControlMismatch {
                open_segment: "ISA",
                close_segment: "IEA",
                ..
            }
        ));
    }

    #[test]
    fn test_check_ge_count_mismatch() {
        let gs = segment(b"GS*HC*S*R*20260201*1253*1*X*005010X222A1~");
        let header = parse_gs(&gs).unwrap();
        let ge = segment(b"GE*2*1~");

        let err = check_ge(&header, &ge, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::ControlMismatch {
                open_segment: "GS",
                close_segment: "GE",
                ..
            }
        ));
    }

    #[test]
    fn test_check_se_segment_count() {
        let st = segment(b"ST*837*0001~");
        let header = parse_st(&st).unwrap();

        let se = segment(b"SE*16*0001~");
        assert!(check_se(&header, &se, 16).is_ok());
        assert!(check_se(&header, &se, 15).is_err());
    }
}

use std::borrow::Cow;

use memchr::{memchr, memchr_iter};

use crate::processor::column::ColumnType;

/// Strips a trailing carriage return left by `\r\n` line endings.
pub(crate) fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Splits one CSV line into `fields`.
///
/// Unquoted lines are split in place. Lines containing a quote go through
/// the slower path, which unescapes doubled quotes into owned buffers.
/// Quoted fields cannot span lines.
pub(crate) fn split_fields<'a>(line: &'a [u8], fields: &mut Vec<Cow<'a, [u8]>>) {
    fields.clear();

    if memchr(b'"', line).is_none() {
        let mut field_start = 0;
        for comma_pos in memchr_iter(b',', line) {
            fields.push(Cow::Borrowed(&line[field_start..comma_pos]));
            field_start = comma_pos + 1;
        }
        fields.push(Cow::Borrowed(&line[field_start..]));
        return;
    }

    split_quoted(line, fields)
}

fn split_quoted<'a>(line: &'a [u8], fields: &mut Vec<Cow<'a, [u8]>>) {
    let mut i = 0;
    loop {
        if i < line.len() && line[i] == b'"' {
            let mut buf = Vec::new();
            i += 1;
            loop {
                match memchr(b'"', &line[i..]) {
                    Some(off) => {
                        buf.extend_from_slice(&line[i..i + off]);
                        i += off + 1;
                        if i < line.len() && line[i] == b'"' {
                            buf.push(b'"');
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    // unterminated quote, keep the rest of the line
                    None => {
                        buf.extend_from_slice(&line[i..]);
                        i = line.len();
                        break;
                    }
                }
            }

            match memchr(b',', &line[i..]) {
                Some(off) => {
                    buf.extend_from_slice(&line[i..i + off]);
                    fields.push(Cow::Owned(buf));
                    i += off + 1;
                }
                None => {
                    buf.extend_from_slice(&line[i..]);
                    fields.push(Cow::Owned(buf));
                    return;
                }
            }
        } else {
            match memchr(b',', &line[i..]) {
                Some(off) => {
                    fields.push(Cow::Borrowed(&line[i..i + off]));
                    i += off + 1;
                }
                None => {
                    fields.push(Cow::Borrowed(&line[i..]));
                    return;
                }
            }
        }
    }
}

/// Field contents read as missing values, in addition to the empty field.
/// Same set as the pandas `read_csv` defaults.
pub(crate) const NA_MARKERS: [&[u8]; 18] = [
    b"#N/A", b"#N/A N/A", b"#NA", b"-1.#IND", b"-1.#QNAN", b"-NaN", b"-nan", b"1.#IND",
    b"1.#QNAN", b"<NA>", b"N/A", b"NA", b"NULL", b"NaN", b"None", b"n/a", b"nan", b"null",
];

pub(crate) fn is_null(field: &[u8]) -> bool {
    field.is_empty() || NA_MARKERS.iter().any(|marker| *marker == field)
}

/// Narrowest type able to hold `field`, or `None` for a null field.
pub(crate) fn classify(field: &[u8]) -> Option<ColumnType> {
    if is_null(field) {
        None
    } else if atoi_simd::parse::<i64>(field).is_ok() {
        Some(ColumnType::Int64)
    } else if fast_float::parse::<f64, _>(field).is_ok_and(|v: f64| !v.is_nan()) {
        Some(ColumnType::Float64)
    } else {
        Some(ColumnType::Str)
    }
}

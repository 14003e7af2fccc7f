//! RS-274X word lexer.
//!
//! Turns Gerber text into the ordered [`DrawEvent`] stream consumed by the
//! socket detector. Only what the detector needs is interpreted: aperture
//! definitions, aperture selection, and the end point of every operation.
//! Everything else is skipped, and malformed words are reported as warnings
//! instead of aborting the layer.

use gerber_types::Unit;
use tracing::debug;

use crate::error::SocketError;

use super::types::{ApertureShape, ApertureTool, DrawEvent, DrawOp, LayerEvents, Point};

const DEFAULT_INTEGER_DIGITS: u8 = 3;
const DEFAULT_DECIMAL_DIGITS: u8 = 6;

/// Lowest D-code that names an aperture.
pub const FIRST_APERTURE_CODE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZeroOmission {
    Leading,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Linear,
    Circular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Interpolate,
    Move,
    Flash,
}

/// Warnings raised at most once per layer.
#[derive(Debug, Clone, Copy, Default)]
struct WarnedOnce {
    format: bool,
    modal: bool,
}

#[derive(Debug)]
struct LexerState {
    integer_digits: u8,
    decimal_digits: u8,
    omission: ZeroOmission,
    declared_format: bool,
    warned: WarnedOnce,
    units: Option<Unit>,
    position: Point,
    interpolation: Interpolation,
    last_operation: Option<Operation>,
    events: Vec<DrawEvent>,
    warnings: Vec<String>,
    done: bool,
}

impl Default for LexerState {
    fn default() -> Self {
        Self {
            integer_digits: DEFAULT_INTEGER_DIGITS,
            decimal_digits: DEFAULT_DECIMAL_DIGITS,
            omission: ZeroOmission::Leading,
            declared_format: false,
            warned: WarnedOnce::default(),
            units: None,
            position: Point::new(0.0, 0.0),
            interpolation: Interpolation::Linear,
            last_operation: None,
            events: Vec::new(),
            warnings: Vec::new(),
            done: false,
        }
    }
}

/// Lex a Gerber file from raw bytes.
///
/// # Errors
///
/// Returns [`SocketError::ParseError`] if the input is not valid UTF-8.
pub fn lex(data: &[u8]) -> Result<LayerEvents, SocketError> {
    let content = std::str::from_utf8(data)
        .map_err(|err| SocketError::ParseError(format!("invalid UTF-8 input: {err}")))?;
    Ok(lex_str(content))
}

/// Lex Gerber text into drawing events.
pub fn lex_str(content: &str) -> LayerEvents {
    let mut state = LexerState::default();
    let mut word = String::new();
    let mut word_line = 1;
    let mut line = 1;
    let mut extended = false;
    let mut block_start = false;
    let mut in_macro = false;

    for ch in content.chars() {
        match ch {
            '\n' => line += 1,
            '\r' => {}
            '%' => {
                if !word.trim().is_empty() {
                    state.warn(word_line, &format!("unterminated word `{}`", word.trim()));
                }
                word.clear();
                extended = !extended;
                block_start = extended;
                in_macro = false;
            }
            '*' => {
                let text = word.trim();
                if !text.is_empty() {
                    if !extended {
                        state.word(text, word_line);
                    } else if block_start && text.starts_with("AM") {
                        in_macro = true;
                    } else if !in_macro {
                        state.extended(text, word_line);
                    }
                    block_start = false;
                }
                word.clear();
                if state.done {
                    break;
                }
            }
            other => {
                if word.is_empty() {
                    if other.is_whitespace() {
                        continue;
                    }
                    word_line = line;
                }
                word.push(other);
            }
        }
    }

    if !state.done && !word.trim().is_empty() {
        state.warn(word_line, &format!("unterminated word `{}`", word.trim()));
    }

    LayerEvents {
        events: state.events,
        units: state.units,
        warnings: state.warnings,
    }
}

impl LexerState {
    fn warn(&mut self, line: usize, msg: &str) {
        self.warnings.push(format!("line {line}: {msg}"));
    }

    fn push(&mut self, line: usize, op: DrawOp) {
        self.events.push(DrawEvent::new(line, op));
    }

    fn extended(&mut self, text: &str, line: usize) {
        if let Some(body) = text.strip_prefix("FS") {
            self.apply_format(body, line);
        } else if let Some(unit) = text.strip_prefix("MO") {
            match unit {
                "MM" => self.units = Some(Unit::Millimeters),
                "IN" => self.units = Some(Unit::Inches),
                other => self.warn(line, &format!("unknown unit `{other}`")),
            }
        } else if let Some(body) = text.strip_prefix("ADD") {
            self.define_aperture(body, line);
        } else {
            debug!(line, word = text, "extended command ignored");
        }
    }

    fn apply_format(&mut self, body: &str, line: usize) {
        let mut chars = body.chars();
        let omission = match chars.next() {
            Some('L') => ZeroOmission::Leading,
            Some('T') => ZeroOmission::Trailing,
            _ => {
                self.warn(line, &format!("invalid format specification `FS{body}`"));
                return;
            }
        };
        if chars.next() == Some('I') {
            self.warn(
                line,
                "incremental coordinates are not supported; reading as absolute",
            );
        }

        match chars.as_str().as_bytes() {
            [b'X', xi, xd, b'Y', yi, yd, ..]
                if [xi, xd, yi, yd].iter().all(|digit| digit.is_ascii_digit()) =>
            {
                if (xi, xd) != (yi, yd) {
                    self.warn(
                        line,
                        "X and Y coordinate formats differ; using the X format",
                    );
                }
                self.integer_digits = xi - b'0';
                self.decimal_digits = xd - b'0';
                self.omission = omission;
                self.declared_format = true;
            }
            _ => self.warn(line, &format!("invalid format specification `FS{body}`")),
        }
    }

    fn define_aperture(&mut self, body: &str, line: usize) {
        let digits = body.bytes().take_while(u8::is_ascii_digit).count();
        let (code_raw, rest) = body.split_at(digits);
        let Ok(code) = code_raw.parse::<u32>() else {
            self.warn(line, &format!("invalid aperture code in `ADD{body}`"));
            return;
        };
        if code < FIRST_APERTURE_CODE {
            self.warn(
                line,
                &format!("aperture code D{code} is reserved and was skipped"),
            );
            return;
        }

        let (template, params_raw) = rest.split_once(',').unwrap_or((rest, ""));
        if template.is_empty() {
            self.warn(line, &format!("missing aperture template in `ADD{body}`"));
            return;
        }

        let params: Result<Vec<f64>, _> = if params_raw.is_empty() {
            Ok(Vec::new())
        } else {
            params_raw
                .split('X')
                .map(|param| param.trim().parse::<f64>())
                .collect()
        };

        match params {
            Ok(params) => self.push(
                line,
                DrawOp::ToolDefine {
                    code,
                    tool: ApertureTool {
                        shape: ApertureShape::from_template(template),
                        params,
                    },
                },
            ),
            Err(err) => self.warn(
                line,
                &format!("invalid aperture parameters for D{code} `{params_raw}`: {err}"),
            ),
        }
    }

    fn word(&mut self, text: &str, line: usize) {
        if text.starts_with("G04") {
            return;
        }
        if text == "M02" || text == "M00" {
            self.done = true;
            return;
        }

        let mut rest = text;
        while let Some(after_g) = rest.strip_prefix('G') {
            let digits = after_g.bytes().take_while(u8::is_ascii_digit).count();
            let (code, tail) = after_g.split_at(digits);
            match code.parse::<u32>() {
                Ok(1) => self.interpolation = Interpolation::Linear,
                Ok(2 | 3) => self.interpolation = Interpolation::Circular,
                Ok(_) => {}
                Err(_) => {
                    self.warn(line, &format!("malformed G-code in `{text}`"));
                    return;
                }
            }
            rest = tail;
        }

        if rest.is_empty() || rest.starts_with('M') {
            return;
        }

        self.operation(rest, text, line);
    }

    fn operation(&mut self, fields_raw: &str, text: &str, line: usize) {
        let Some(fields) = split_fields(fields_raw) else {
            self.warn(line, &format!("malformed word `{text}`"));
            return;
        };

        let mut x = None;
        let mut y = None;
        let mut d_code = None;
        for (letter, value) in fields {
            match letter {
                'X' | 'Y' => {
                    let Some(value) = self.coordinate(value, text, line) else {
                        return;
                    };
                    if letter == 'X' {
                        x = Some(value);
                    } else {
                        y = Some(value);
                    }
                }
                'I' | 'J' => {}
                'D' => {
                    let Ok(code) = value.parse::<u32>() else {
                        self.warn(line, &format!("invalid operation code in `{text}`"));
                        return;
                    };
                    d_code = Some(code);
                }
                _ => {
                    self.warn(line, &format!("unknown word `{text}`"));
                    return;
                }
            }
        }

        let has_coordinates = x.is_some() || y.is_some();
        let operation = match d_code {
            Some(code) if code >= FIRST_APERTURE_CODE => {
                if has_coordinates {
                    self.warn(
                        line,
                        &format!("aperture selection with coordinates `{text}`"),
                    );
                }
                self.push(line, DrawOp::ToolSelect { code });
                return;
            }
            Some(1) => Operation::Interpolate,
            Some(2) => Operation::Move,
            Some(3) => Operation::Flash,
            Some(_) | None if !has_coordinates => {
                self.warn(line, &format!("unsupported word `{text}`"));
                return;
            }
            Some(code) => {
                self.warn(
                    line,
                    &format!("unsupported operation D{code:02} in `{text}`"),
                );
                return;
            }
            None => {
                let Some(previous) = self.last_operation else {
                    self.warn(
                        line,
                        &format!("coordinates without an operation in `{text}`"),
                    );
                    return;
                };
                if !self.warned.modal {
                    self.warn(
                        line,
                        "coordinates without an operation code reuse the previous operation",
                    );
                    self.warned.modal = true;
                }
                previous
            }
        };

        let target = Point::new(x.unwrap_or(self.position.x), y.unwrap_or(self.position.y));
        let op = match (operation, self.interpolation) {
            (Operation::Interpolate, Interpolation::Linear) => DrawOp::Draw(target),
            (Operation::Interpolate, Interpolation::Circular) => {
                debug!(line, "arc end point recorded as a move");
                DrawOp::Move(target)
            }
            (Operation::Move | Operation::Flash, _) => DrawOp::Move(target),
        };
        self.push(line, op);
        self.position = target;
        self.last_operation = Some(operation);
    }

    fn coordinate(&mut self, raw: &str, text: &str, line: usize) -> Option<f64> {
        if !raw.contains('.') && !self.declared_format && !self.warned.format {
            self.warn(
                line,
                "coordinate format not declared; assuming 3.6 with leading zero omission",
            );
            self.warned.format = true;
        }
        let (digits, decimals) = (self.integer_digits, self.decimal_digits);
        let value = parse_coordinate(raw, digits, decimals, self.omission);
        if value.is_none() {
            self.warn(line, &format!("invalid coordinate `{raw}` in `{text}`"));
        }
        value
    }
}

fn split_fields(word: &str) -> Option<Vec<(char, &str)>> {
    let mut fields = Vec::new();
    let mut rest = word;
    while let Some(letter) = rest.chars().next() {
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let body = rest.get(letter.len_utf8()..)?;
        let len = body
            .find(|ch: char| ch.is_ascii_alphabetic())
            .unwrap_or(body.len());
        let (value, tail) = body.split_at(len);
        if value.is_empty() {
            return None;
        }
        fields.push((letter, value));
        rest = tail;
    }
    Some(fields)
}

#[allow(clippy::cast_precision_loss)]
fn parse_coordinate(
    raw: &str,
    integer_digits: u8,
    decimal_digits: u8,
    omission: ZeroOmission,
) -> Option<f64> {
    if raw.contains('.') {
        return raw.parse::<f64>().ok().filter(|value| value.is_finite());
    }

    let (sign, digits) = match (raw.strip_prefix('-'), raw.strip_prefix('+')) {
        (Some(rest), _) => (-1.0, rest),
        (None, Some(rest)) => (1.0, rest),
        (None, None) => (1.0, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let total = usize::from(integer_digits) + usize::from(decimal_digits);
    let expanded = match omission {
        ZeroOmission::Leading => digits.to_string(),
        ZeroOmission::Trailing => format!("{digits:0<total$}"),
    };
    let magnitude = expanded.parse::<u64>().ok()? as f64;
    Some(sign * magnitude / 10_f64.powi(i32::from(decimal_digits)))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    const SOCKET_LAYER: &str = "G04 socket layer*\n\
        %FSLAX46Y46*%\n\
        %MOMM*%\n\
        %LPD*%\n\
        %ADD10C,0.00999*%\n\
        %ADD11C,0.01071*%\n\
        D10*\n\
        X-6500000Y8250000D02*\n\
        X-6500000Y8250000D01*\n\
        D11*\n\
        X-6500000Y8250000D01*\n\
        M02*\n";

    #[test]
    fn ut_lex_001_socket_layer_produces_ordered_events() {
        let layer = lex_str(SOCKET_LAYER);
        assert!(layer.warnings.is_empty(), "warnings: {:?}", layer.warnings);
        assert_eq!(layer.units, Some(Unit::Millimeters));
        assert_eq!(
            layer.events,
            vec![
                DrawEvent::new(
                    5,
                    DrawOp::ToolDefine {
                        code: 10,
                        tool: ApertureTool::circle(0.00999)
                    }
                ),
                DrawEvent::new(
                    6,
                    DrawOp::ToolDefine {
                        code: 11,
                        tool: ApertureTool::circle(0.01071)
                    }
                ),
                DrawEvent::new(7, DrawOp::ToolSelect { code: 10 }),
                DrawEvent::new(8, DrawOp::Move(Point::new(-6.5, 8.25))),
                DrawEvent::new(9, DrawOp::Draw(Point::new(-6.5, 8.25))),
                DrawEvent::new(10, DrawOp::ToolSelect { code: 11 }),
                DrawEvent::new(11, DrawOp::Draw(Point::new(-6.5, 8.25))),
            ]
        );
    }

    #[test]
    fn ut_lex_002_aperture_templates_and_params() {
        let layer = lex_str(
            "%FSLAX46Y46*%%ADD12R,1.5X0.8*%\
            %ADD13RoundRect,0.1X0.5X0.5*%%ADD14THERMAL*%",
        );
        assert_eq!(layer.events.len(), 3);
        assert_eq!(
            layer.events[0].op,
            DrawOp::ToolDefine {
                code: 12,
                tool: ApertureTool {
                    shape: ApertureShape::Rectangle,
                    params: vec![1.5, 0.8]
                }
            }
        );
        assert_eq!(
            layer.events[1].op,
            DrawOp::ToolDefine {
                code: 13,
                tool: ApertureTool {
                    shape: ApertureShape::Macro("RoundRect".to_string()),
                    params: vec![0.1, 0.5, 0.5]
                }
            }
        );
        assert_eq!(
            layer.events[2].op,
            DrawOp::ToolDefine {
                code: 14,
                tool: ApertureTool {
                    shape: ApertureShape::Macro("THERMAL".to_string()),
                    params: Vec::new()
                }
            }
        );
    }

    #[test]
    fn ut_lex_003_macro_bodies_are_skipped() {
        let input = "%FSLAX46Y46*%\n\
            %AMTHERMAL*\n\
            7,0,0,0.8,0.6,0.1,45*%\n\
            %ADD10THERMAL*%\n\
            D10*\n\
            X0Y0D03*\n";
        let layer = lex_str(input);
        assert!(layer.warnings.is_empty(), "warnings: {:?}", layer.warnings);
        assert_eq!(layer.events.len(), 3);
        assert_eq!(layer.events[2].op, DrawOp::Move(Point::new(0.0, 0.0)));
        assert_eq!(layer.events[2].line, 6);
    }

    #[test]
    fn ut_lex_004_modal_coordinates_keep_missing_axis() {
        let layer = lex_str("%FSLAX46Y46*%D10*X1000000Y2000000D02*Y3000000D01*X0D01*");
        let points: Vec<DrawOp> = layer.events.iter().map(|e| e.op.clone()).collect();
        assert_eq!(
            points,
            vec![
                DrawOp::ToolSelect { code: 10 },
                DrawOp::Move(Point::new(1.0, 2.0)),
                DrawOp::Draw(Point::new(1.0, 3.0)),
                DrawOp::Draw(Point::new(0.0, 3.0)),
            ]
        );
    }

    #[test]
    fn ut_lex_005_trailing_zero_omission() {
        let layer = lex_str("%FSTAX24Y24*%X15Y25D02*");
        assert_eq!(layer.events.len(), 1);
        let point = match layer.events[0].op {
            DrawOp::Move(point) => Some(point),
            _ => None,
        };
        let near = |p: Point| (p.x - 15.0).abs() < EPSILON && (p.y - 25.0).abs() < EPSILON;
        assert!(point.is_some_and(near));
    }

    #[test]
    fn ut_lex_006_g54_prefixed_select_and_g01_prefixed_draw() {
        let layer = lex_str("%FSLAX46Y46*%G54D11*G01X0Y0D02*G01X0Y0D01*");
        let ops: Vec<DrawOp> = layer.events.iter().map(|e| e.op.clone()).collect();
        assert_eq!(
            ops,
            vec![
                DrawOp::ToolSelect { code: 11 },
                DrawOp::Move(Point::new(0.0, 0.0)),
                DrawOp::Draw(Point::new(0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn ut_lex_007_arc_end_point_is_a_move() {
        let layer = lex_str("%FSLAX46Y46*%X0Y0D02*G75*G02X1000000Y0I500000J0D01*G01*");
        assert_eq!(layer.events.len(), 2);
        assert_eq!(layer.events[1].op, DrawOp::Move(Point::new(1.0, 0.0)));
    }

    #[test]
    fn ut_lex_008_units_inches() {
        let layer = lex_str("%FSLAX26Y26*%%MOIN*%");
        assert_eq!(layer.units, Some(Unit::Inches));
    }

    #[test]
    fn bc_lex_001_missing_operation_code_reuses_previous_with_warning() {
        let layer = lex_str("%FSLAX46Y46*%X0Y0D02*X0Y0D01*X1000000Y0*");
        assert_eq!(layer.events.len(), 3);
        assert_eq!(layer.events[2].op, DrawOp::Draw(Point::new(1.0, 0.0)));
        assert!(layer
            .warnings
            .iter()
            .any(|w| w.contains("reuse the previous operation")));
    }

    #[test]
    fn bc_lex_002_missing_format_warns_once_and_uses_default() {
        let layer = lex_str("X1000000Y2000000D02*X1000000Y2000000D01*");
        assert_eq!(layer.events.len(), 2);
        assert_eq!(layer.events[1].op, DrawOp::Draw(Point::new(1.0, 2.0)));
        let count = layer
            .warnings
            .iter()
            .filter(|w| w.contains("coordinate format not declared"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn bc_lex_003_malformed_words_are_skipped_with_warning() {
        let layer = lex_str("%FSLAX46Y46*%%ADD10C,abc*%X1.2.3Y0D02*x0y0D02*X0Y0D02*");
        assert_eq!(layer.events.len(), 1);
        assert!(layer
            .warnings
            .iter()
            .any(|w| w.contains("invalid aperture parameters")));
        assert!(layer.warnings.iter().any(|w| w.contains("malformed word")));
    }

    #[test]
    fn bc_lex_004_stream_stops_at_m02() {
        let layer = lex_str("%FSLAX46Y46*%X0Y0D02*M02*X0Y0D01*");
        assert_eq!(layer.events.len(), 1);
        assert!(layer.warnings.is_empty());
    }

    #[test]
    fn bc_lex_005_invalid_utf8_is_a_parse_error() {
        let result = lex(&[0xff, 0xfe, b'*']);
        assert!(matches!(result, Err(SocketError::ParseError(_))));
    }

    #[test]
    fn bc_lex_006_unterminated_word_warns() {
        let layer = lex_str("%FSLAX46Y46*%X0Y0D02");
        assert!(layer.events.is_empty());
        assert!(layer.warnings.iter().any(|w| w.contains("unterminated")));
    }

    #[test]
    fn bc_lex_007_reserved_aperture_code_is_skipped() {
        let layer = lex_str("%ADD03C,0.5*%");
        assert!(layer.events.is_empty());
        assert!(layer.warnings.iter().any(|w| w.contains("reserved")));
    }

    #[test]
    fn bc_lex_008_flash_then_draw_at_same_point_records_circle() {
        let layer = lex_str(
            "%FSLAX46Y46*%%ADD10C,0.00999*%D10*\
            X1000000Y1000000D03*X1000000Y1000000D01*",
        );
        let ops: Vec<DrawOp> = layer.events.iter().skip(2).map(|e| e.op.clone()).collect();
        assert_eq!(
            ops,
            vec![
                DrawOp::Move(Point::new(1.0, 1.0)),
                DrawOp::Draw(Point::new(1.0, 1.0)),
            ]
        );
        assert_eq!(crate::socket::detect_circles(&layer.events).len(), 1);
    }
}

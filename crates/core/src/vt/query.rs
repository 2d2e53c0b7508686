// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow streaming scanner for CSI/OSC/APC escape sequences (spec §4.A
//! "Terminal responses", "DEC private modes"). `avt::Vt` owns the actual
//! screen emulation; it exposes no hook for arbitrary query/response
//! sequences or for which DEC private modes are currently set, so the
//! [`Responder`](super::responder::Responder) and the [`Screen`](super::screen::Screen)'s
//! own mode tracking scan the same raw bytes independently, looking only for
//! the handful of sequence shapes they each care about. State persists
//! across [`QueryScanner::scan`] calls so a sequence split across two reads
//! still resolves into one event, without a manual carry buffer.

/// A decoded CSI (`ESC [ ... final`) sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiParams {
    /// `true` when the sequence carries the `?` private-mode prefix.
    pub private: bool,
    /// Numeric parameters, in order; `None` for an omitted (empty) field.
    pub params: Vec<Option<u16>>,
    pub intermediates: Vec<u8>,
    pub final_byte: u8,
}

impl CsiParams {
    /// The parameter at `index`, defaulting to `default` when omitted or absent.
    pub fn param(&self, index: usize, default: u16) -> u16 {
        self.params.get(index).and_then(|p| *p).unwrap_or(default)
    }
}

/// A recognized query-relevant escape sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    Csi(CsiParams),
    /// OSC payload, `ident` is the numeric prefix (e.g. `10`, `11`, `4`) and
    /// `data` the remainder after its separating `;`.
    Osc { ident: String, data: String },
    /// APC payload (kitty graphics protocol query, etc).
    Apc(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Osc,
    OscEscape,
    Apc,
    ApcEscape,
}

/// Streaming scanner recognizing CSI/OSC/APC sequences in raw PTY output.
/// Everything else (plain text, C0 controls, other escape forms) is ignored
/// — this is not a screen emulator, only a query/mode recognizer.
#[derive(Debug)]
pub struct QueryScanner {
    state: State,
    seq: Vec<u8>,
}

impl Default for QueryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryScanner {
    pub fn new() -> Self {
        Self { state: State::Ground, seq: Vec::new() }
    }

    pub fn scan(&mut self, data: &[u8]) -> Vec<QueryEvent> {
        let mut events = Vec::new();
        for &b in data {
            self.step(b, &mut events);
        }
        events
    }

    fn step(&mut self, b: u8, events: &mut Vec<QueryEvent>) {
        match self.state {
            State::Ground => {
                if b == 0x1b {
                    self.seq.clear();
                    self.state = State::Escape;
                }
            }
            State::Escape => match b {
                b'[' => self.state = State::Csi,
                b']' => self.state = State::Osc,
                b'_' => self.state = State::Apc,
                _ => self.state = State::Ground,
            },
            State::Csi => {
                if (0x40..=0x7e).contains(&b) {
                    events.push(QueryEvent::Csi(parse_csi(&self.seq, b)));
                    self.seq.clear();
                    self.state = State::Ground;
                } else {
                    self.seq.push(b);
                }
            }
            State::Osc => match b {
                0x07 => {
                    events.push(parse_osc(&self.seq));
                    self.seq.clear();
                    self.state = State::Ground;
                }
                0x1b => self.state = State::OscEscape,
                _ => self.seq.push(b),
            },
            State::OscEscape => {
                if b == b'\\' {
                    events.push(parse_osc(&self.seq));
                    self.seq.clear();
                    self.state = State::Ground;
                } else {
                    // Not a valid ST — treat the swallowed ESC as OSC content
                    // and keep collecting.
                    self.seq.push(0x1b);
                    self.seq.push(b);
                    self.state = State::Osc;
                }
            }
            State::Apc => {
                if b == 0x1b {
                    self.state = State::ApcEscape;
                } else {
                    self.seq.push(b);
                }
            }
            State::ApcEscape => {
                if b == b'\\' {
                    events.push(QueryEvent::Apc(String::from_utf8_lossy(&self.seq).into_owned()));
                    self.seq.clear();
                    self.state = State::Ground;
                } else {
                    self.seq.push(0x1b);
                    self.seq.push(b);
                    self.state = State::Apc;
                }
            }
        }
    }
}

fn parse_csi(body: &[u8], final_byte: u8) -> CsiParams {
    let private = body.first() == Some(&b'?');
    let params_region = if private { &body[1..] } else { body };

    let split = params_region.iter().position(|b| (0x20..=0x2f).contains(b));
    let (param_bytes, intermediates) = match split {
        Some(idx) => (&params_region[..idx], params_region[idx..].to_vec()),
        None => (params_region, Vec::new()),
    };

    let text = String::from_utf8_lossy(param_bytes);
    let params: Vec<Option<u16>> = if text.is_empty() {
        Vec::new()
    } else {
        text.split(';')
            .map(|field| {
                let field = field.split(':').next().unwrap_or("");
                if field.is_empty() {
                    None
                } else {
                    field.parse::<u16>().ok()
                }
            })
            .collect()
    };

    CsiParams { private, params, intermediates, final_byte }
}

fn parse_osc(body: &[u8]) -> QueryEvent {
    let text = String::from_utf8_lossy(body);
    match text.split_once(';') {
        Some((ident, data)) => QueryEvent::Osc { ident: ident.to_owned(), data: data.to_owned() },
        None => QueryEvent::Osc { ident: text.into_owned(), data: String::new() },
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;

//! Run-ending faults and their translation into diagnostic text.

use std::fmt;

/// One frame of a fault's call stack, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Source name the frame executed in.
    pub file: String,
    /// 1-based line number, when known.
    pub line: Option<u32>,
    /// Function or scope name.
    pub function: String,
}

impl Frame {
    /// Create a frame.
    #[must_use]
    pub fn new(file: impl Into<String>, line: Option<u32>, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// How a fault relates to the one that was being handled when it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    /// Raised explicitly `from` the earlier fault.
    Cause,
    /// Raised while the earlier fault was being handled.
    Context,
}

impl Chain {
    const fn separator(self) -> &'static str {
        match self {
            Self::Cause => "The above exception was the direct cause of the following exception:",
            Self::Context => "During handling of the above exception, another exception occurred:",
        }
    }

    fn from_separator(line: &str) -> Option<Self> {
        [Self::Cause, Self::Context]
            .into_iter()
            .find(|chain| line.trim() == chain.separator())
    }
}

/// A failure that ended a run, with its structured trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Fault class, e.g. `ZeroDivisionError`.
    pub kind: String,
    /// Human-readable message; may be empty or span several lines.
    pub message: String,
    /// Call stack, outermost first.
    pub frames: Vec<Frame>,
    /// Earlier fault this one was chained to, if any.
    pub cause: Option<(Chain, Box<Fault>)>,
}

impl Fault {
    /// Create a fault with no frames.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Append a frame (innermost last).
    #[must_use]
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Chain this fault to the earlier one it was raised from or during.
    #[must_use]
    pub fn with_cause(mut self, chain: Chain, cause: Self) -> Self {
        self.cause = Some((chain, Box::new(cause)));
        self
    }

    /// Fault for an engine thread that panicked.
    #[must_use]
    pub fn engine_panic(detail: impl Into<String>) -> Self {
        Self::new("EnginePanic", detail)
    }

    /// Parse a conventional traceback rendering.
    ///
    /// Chained blocks become the `cause` chain, the last block being the
    /// returned fault. Within a block, source excerpt and caret lines under a
    /// frame are skipped; the first unindented line after them starts the
    /// `Kind: message` text and every line after it belongs to the message.
    #[must_use]
    pub fn parse_traceback(text: &str) -> Self {
        let mut fault: Option<Self> = None;
        let mut chain = None;
        let mut block = Vec::new();

        for line in text.lines() {
            if let Some(next) = Chain::from_separator(line) {
                fault = Some(chain_block(fault, chain, &block));
                chain = Some(next);
                block.clear();
            } else {
                block.push(line);
            }
        }
        chain_block(fault, chain, &block)
    }
}

fn chain_block(earlier: Option<Fault>, chain: Option<Chain>, lines: &[&str]) -> Fault {
    let fault = parse_block(lines);
    match (earlier, chain) {
        (Some(earlier), Some(chain)) => fault.with_cause(chain, earlier),
        _ => fault,
    }
}

fn parse_block(lines: &[&str]) -> Fault {
    let mut frames = Vec::new();
    let mut exception = None;

    for (index, line) in lines.iter().enumerate() {
        if line.starts_with("Traceback (most recent call last)") {
            continue;
        }
        if let Some(frame) = parse_frame_line(line) {
            frames.push(frame);
        } else if !line.is_empty() && !line.starts_with(char::is_whitespace) {
            exception = Some(index);
            break;
        }
    }

    let text = exception
        .map(|index| lines[index..].join("\n"))
        .unwrap_or_default();
    let text = text.trim_end();
    let (head, rest) = text.split_once('\n').unwrap_or((text, ""));
    let (kind, first) = match head.split_once(": ") {
        Some((kind, first)) => (kind, first),
        None => (head.trim_end_matches(':'), ""),
    };
    let message = if rest.is_empty() {
        first.to_string()
    } else {
        format!("{first}\n{rest}")
    };

    Fault {
        kind: if kind.is_empty() { "Exception" } else { kind }.to_string(),
        message,
        frames,
        cause: None,
    }
}

fn parse_frame_line(line: &str) -> Option<Frame> {
    let rest = line.trim_start().strip_prefix("File \"")?;
    let (file, rest) = rest.split_once('"')?;
    let mut line_no = None;
    let mut function = String::new();
    for part in rest.split(", ").map(str::trim) {
        if let Some(n) = part.strip_prefix("line ") {
            line_no = n.parse().ok();
        } else if let Some(name) = part.strip_prefix("in ") {
            function = name.to_string();
        }
    }
    Some(Frame::new(file, line_no, function))
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((chain, cause)) = &self.cause {
            write!(f, "{cause}\n\n{}\n\n", chain.separator())?;
        }
        if !self.frames.is_empty() {
            writeln!(f, "Traceback (most recent call last):")?;
            for frame in &self.frames {
                write!(f, "  File \"{}\"", frame.file)?;
                if let Some(line) = frame.line {
                    write!(f, ", line {line}")?;
                }
                if !frame.function.is_empty() {
                    write!(f, ", in {}", frame.function)?;
                }
                writeln!(f)?;
            }
        }
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Render a fault as the content of its `error` message.
#[must_use]
pub fn translate(fault: &Fault) -> String {
    fault.to_string().trim_end_matches('\n').to_string()
}

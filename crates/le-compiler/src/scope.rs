use le_runtime::{CaptureSource, Expr};

/// Locals and captures of one function body (or of the top level).
#[derive(Debug, Default)]
struct FnScope {
    locals: Vec<(String, usize)>,
    captures: Vec<(String, CaptureSource)>,
    next_slot: usize,
}

/// Lexical environment while lowering forms. Slots are never reused, so the
/// frame size of a body is the number of slots it ever allocated.
#[derive(Debug)]
pub(crate) struct Scopes {
    stack: Vec<FnScope>,
}

pub(crate) struct FnFrame {
    pub frame_size: usize,
    pub captures: Vec<CaptureSource>,
}

impl Scopes {
    pub(crate) fn new() -> Self {
        Self {
            stack: vec![FnScope::default()],
        }
    }

    fn current(&mut self) -> &mut FnScope {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub(crate) fn enter_fn(&mut self) {
        self.stack.push(FnScope::default());
    }

    pub(crate) fn exit_fn(&mut self) -> FnFrame {
        let scope = self.stack.pop().unwrap_or_default();
        FnFrame {
            frame_size: scope.next_slot,
            captures: scope.captures.into_iter().map(|(_, source)| source).collect(),
        }
    }

    /// Frame size of the top-level body.
    pub(crate) fn top_frame_size(&self) -> usize {
        self.stack.first().map_or(0, |scope| scope.next_slot)
    }

    pub(crate) fn declare(&mut self, name: &str) -> usize {
        let scope = self.current();
        let slot = scope.next_slot;
        scope.next_slot += 1;
        scope.locals.push((name.to_string(), slot));
        slot
    }

    /// Number of visible locals, to be passed back to [`Scopes::truncate`].
    pub(crate) fn mark(&mut self) -> usize {
        self.current().locals.len()
    }

    pub(crate) fn truncate(&mut self, mark: usize) {
        self.current().locals.truncate(mark);
    }

    pub(crate) fn resolve(&mut self, name: &str) -> Option<Expr> {
        let depth = self.stack.len() - 1;
        self.resolve_at(depth, name).map(|source| match source {
            CaptureSource::Local(slot) => Expr::Local(slot),
            CaptureSource::Capture(index) => Expr::Capture(index),
        })
    }

    fn resolve_at(&mut self, depth: usize, name: &str) -> Option<CaptureSource> {
        let scope = &self.stack[depth];
        if let Some((_, slot)) = scope.locals.iter().rev().find(|(local, _)| local == name) {
            return Some(CaptureSource::Local(*slot));
        }
        if let Some(index) = scope.captures.iter().position(|(captured, _)| captured == name) {
            return Some(CaptureSource::Capture(index));
        }
        if depth == 0 {
            return None;
        }
        let outer = self.resolve_at(depth - 1, name)?;
        let captures = &mut self.stack[depth].captures;
        captures.push((name.to_string(), outer));
        Some(CaptureSource::Capture(captures.len() - 1))
    }
}

use crate::loc::Loc;

#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
struct Frame {
    parent_active: bool,
    active: bool,
    seen_true: bool,
    else_seen: bool,
    loc: Loc,
}

/// Nesting of `ifeq`/`ifdef` blocks.
#[derive(Clone, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct CondStack {
    frames: Vec::<Frame>,
}

impl CondStack {
    #[inline]
    pub fn active(&self) -> bool {
        self.frames.last().map_or(true, |f| f.active)
    }

    /// Location of the innermost open conditional.
    #[inline]
    pub fn open_loc(&self) -> Option::<&Loc> {
        self.frames.last().map(|f| &f.loc)
    }

    pub fn push(&mut self, cond: bool, loc: Loc) {
        let parent_active = self.active();
        let active = parent_active && cond;
        self.frames.push(Frame { parent_active, active, seen_true: active, else_seen: false, loc })
    }

    /// Whether an `else if...` branch must evaluate its condition.
    pub fn else_needs_test(&self) -> Result::<bool, &'static str> {
        let frame = self.frames.last().ok_or("extraneous 'else'")?;
        if frame.else_seen {
            return Err("only one 'else' per conditional")
        }
        Ok(frame.parent_active && !frame.seen_true)
    }

    /// Switches to the next branch. `cond` is the branch condition for
    /// `else if...`, `None` for a bare `else`.
    pub fn flip(&mut self, cond: Option::<bool>) -> Result::<(), &'static str> {
        let frame = self.frames.last_mut().ok_or("extraneous 'else'")?;
        if frame.else_seen {
            return Err("only one 'else' per conditional")
        }
        let take = frame.parent_active && !frame.seen_true && cond.unwrap_or(true);
        frame.active = take;
        frame.seen_true |= take;
        if cond.is_none() {
            frame.else_seen = true
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Result::<(), &'static str> {
        self.frames.pop().map(|_| ()).ok_or("extraneous 'endif'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    fn loc() -> Loc {
        Loc::new(&Arc::from("Makefile"), 1)
    }

    #[test]
    fn else_if_chain_takes_first_true_branch() {
        let mut stack = CondStack::default();
        stack.push(false, loc());
        assert!(!stack.active());
        assert!(stack.else_needs_test().unwrap());
        stack.flip(Some(true)).unwrap();
        assert!(stack.active());
        assert!(!stack.else_needs_test().unwrap());
        stack.flip(Some(true)).unwrap();
        assert!(!stack.active());
        stack.flip(None).unwrap();
        assert!(!stack.active());
        stack.pop().unwrap();
        assert!(stack.active());
    }

    #[test]
    fn inactive_parent_disables_children() {
        let mut stack = CondStack::default();
        stack.push(false, loc());
        stack.push(true, loc());
        assert!(!stack.active());
        stack.flip(None).unwrap();
        assert!(!stack.active());
    }

    #[test]
    fn malformed_nesting() {
        let mut stack = CondStack::default();
        assert_eq!(stack.pop(), Err("extraneous 'endif'"));
        assert_eq!(stack.flip(None), Err("extraneous 'else'"));
        stack.push(true, loc());
        stack.flip(None).unwrap();
        assert_eq!(stack.flip(None), Err("only one 'else' per conditional"));
    }
}

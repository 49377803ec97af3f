macro_rules! define_modes {
    ($([$letter: literal, $name: ident, $description: literal]), *) => { paste::paste! {
        #[repr(u64)]
        enum ModeBit { $([<$name:camel>]), * }

        /// Boolean switches of one run, one bit each.
        #[derive(Clone, Copy, Default, PartialEq, Eq)]
        #[repr(transparent)]
        #[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
        pub struct Mode(u64);

        impl Mode {
            $(
                #[doc = $description]
                #[inline(always)]
                pub fn $name(&self) -> bool {
                    (self.0 & (1u64 << ModeBit::[<$name:camel>] as u64)) != 0
                }

                #[inline(always)]
                pub fn [<set_ $name>](&mut self, on: bool) {
                    let bit = 1u64 << ModeBit::[<$name:camel>] as u64;
                    if on { self.0 |= bit } else { self.0 &= !bit }
                }
            )*

            /// The single-letter cluster passed down in `MAKEFLAGS`.
            pub fn letters(&self) -> String {
                let mut s = String::new();
                $(if self.$name() && $letter != 'w' { s.push($letter) })*
                s
            }

            /// Sets every flag named by `letters`, ignoring unknown ones.
            pub fn from_letters(letters: &str) -> Self {
                let mut mode = Self::default();
                for c in letters.chars() {
                    $(if c == $letter { mode.[<set_ $name>](true) })*
                }
                mode
            }

            #[inline]
            pub fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }
        }
    }}
}

define_modes! {
    ['n', dry_run,              "print recipes without running them"],
    ['k', keep_going,           "keep building independent targets after a failure"],
    ['q', question,             "run nothing, exit 1 when something is out of date"],
    ['t', touch,                "touch targets instead of running their recipes"],
    ['B', always_make,          "consider every target out of date"],
    ['s', silent,               "do not echo recipes"],
    ['i', ignore_errors,        "ignore every recipe failure"],
    ['r', no_builtin_rules,     "disable the builtin implicit rules"],
    ['R', no_builtin_variables, "disable the builtin variables"],
    ['e', env_override,         "let the environment override makefile assignments"],
    ['d', trace,                "print debugging information"],
    ['w', print_directory,      "print the working directory before and after"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip() {
        let mut mode = Mode::default();
        mode.set_keep_going(true);
        mode.set_silent(true);
        mode.set_print_directory(true);
        assert_eq!(mode.letters(), "ks");
        let back = Mode::from_letters("ks");
        assert!(back.keep_going() && back.silent());
        assert!(!back.dry_run());
    }

    #[test]
    fn setters_clear_bits() {
        let mut mode = Mode::from_letters("nB");
        assert!(mode.always_make());
        mode.set_always_make(false);
        assert!(!mode.always_make());
        assert!(mode.dry_run());
    }
}

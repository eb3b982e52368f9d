//! Canonical term rendering and the `format/1,2` directive sink.
//!
//! Solution values surface through this writer in the REPL and the tests,
//! so the rendering rules are part of the engine contract: quoted atoms,
//! `1.0Inf`-style special floats, bracketed lists, and a small infix set.

use crate::env::{collect_proper_list, Env};
use crate::error::Error;
use crate::symbol::{NameId, Names, SymbolStore};
use crate::term::{Term, TermId, TermStore};
use std::io::{self, Write};

/// Nesting cap for the writer. Programs that tie cycles through unification
/// would otherwise never terminate here; past the cap we emit `...`.
const WRITE_DEPTH_LIMIT: usize = 2048;

/// Render `t` (resolved in `env`) to `out`.
pub fn write_term(
    out: &mut dyn Write,
    t: TermId,
    env: &Env,
    terms: &TermStore,
    symbols: &SymbolStore,
    ns: &Names,
) -> io::Result<()> {
    write_rec(out, t, 0, env, terms, symbols, ns)
}

/// Render `t` to a fresh string.
pub fn term_to_string(
    t: TermId,
    env: &Env,
    terms: &TermStore,
    symbols: &SymbolStore,
    ns: &Names,
) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = write_term(&mut buf, t, env, terms, symbols, ns);
    String::from_utf8_lossy(&buf).into_owned()
}

fn write_rec(
    out: &mut dyn Write,
    t: TermId,
    depth: usize,
    env: &Env,
    terms: &TermStore,
    symbols: &SymbolStore,
    ns: &Names,
) -> io::Result<()> {
    if depth > WRITE_DEPTH_LIMIT {
        return out.write_all(b"...");
    }
    let t = env.resolve(t, terms);
    match terms.get(t) {
        Some(Term::Var(v)) => match terms.var_name(v).and_then(|n| symbols.resolve(n)) {
            Some(name) => write!(out, "{}", name),
            None => write!(out, "_G{}", v.raw()),
        },
        Some(Term::Atom(name)) => write_atom(out, symbols.resolve(name).unwrap_or("?")),
        Some(Term::Int(i)) => write!(out, "{}", i),
        Some(Term::Float(bits)) => write!(out, "{}", fmt_float(f64::from_bits(bits))),
        Some(Term::Str(bytes)) => {
            out.write_all(b"\"")?;
            out.write_all(&bytes)?;
            out.write_all(b"\"")
        }
        Some(Term::Compound(functor, args)) => {
            if functor == ns.dot && args.len() == 2 {
                return write_list(out, &args, depth, env, terms, symbols, ns);
            }
            if functor == ns.braces && args.len() == 1 {
                out.write_all(b"{")?;
                write_rec(out, args[0], depth + 1, env, terms, symbols, ns)?;
                return out.write_all(b"}");
            }
            if args.len() == 2 {
                if let Some(op) = infix_name(functor, ns, symbols) {
                    write_rec(out, args[0], depth + 1, env, terms, symbols, ns)?;
                    write!(out, "{}", op)?;
                    return write_rec(out, args[1], depth + 1, env, terms, symbols, ns);
                }
            }
            write_atom(out, symbols.resolve(functor).unwrap_or("?"))?;
            out.write_all(b"(")?;
            for (i, &arg) in args.iter().enumerate() {
                if i > 0 {
                    out.write_all(b", ")?;
                }
                write_rec(out, arg, depth + 1, env, terms, symbols, ns)?;
            }
            out.write_all(b")")
        }
        None => write!(out, "<invalid:{}>", t.raw()),
    }
}

fn write_list(
    out: &mut dyn Write,
    args: &[TermId],
    depth: usize,
    env: &Env,
    terms: &TermStore,
    symbols: &SymbolStore,
    ns: &Names,
) -> io::Result<()> {
    out.write_all(b"[")?;
    write_rec(out, args[0], depth + 1, env, terms, symbols, ns)?;
    let mut tail = env.resolve(args[1], terms);
    let mut steps = 0;
    loop {
        steps += 1;
        if steps > WRITE_DEPTH_LIMIT {
            out.write_all(b"|...")?;
            break;
        }
        match terms.get(tail) {
            Some(Term::Atom(name)) if name == ns.nil => break,
            Some(Term::Compound(functor, next)) if functor == ns.dot && next.len() == 2 => {
                out.write_all(b", ")?;
                write_rec(out, next[0], depth + 1, env, terms, symbols, ns)?;
                tail = env.resolve(next[1], terms);
            }
            _ => {
                out.write_all(b"|")?;
                write_rec(out, tail, depth + 1, env, terms, symbols, ns)?;
                break;
            }
        }
    }
    out.write_all(b"]")
}

/// The rendered spelling of a two-argument infix functor, if it is one.
/// `is` keeps its surrounding spaces; symbolic operators write tight.
fn infix_name(functor: NameId, ns: &Names, symbols: &SymbolStore) -> Option<String> {
    if functor == ns.is {
        return Some(" is ".to_string());
    }
    let symbolic = [
        ns.plus,
        ns.minus,
        ns.star,
        ns.slash,
        ns.gt,
        ns.lt,
        ns.ge,
        ns.le,
        ns.not_unify,
        ns.unify,
        ns.semicolon,
    ];
    if symbolic.contains(&functor) {
        return symbols.resolve(functor).map(|s| s.to_string());
    }
    None
}

fn write_atom(out: &mut dyn Write, name: &str) -> io::Result<()> {
    if atom_is_plain(name) {
        return write!(out, "{}", name);
    }
    out.write_all(b"'")?;
    for c in name.chars() {
        if c == '\'' {
            out.write_all(b"''")?;
        } else {
            write!(out, "{}", c)?;
        }
    }
    out.write_all(b"'")
}

/// Atoms that render without quotes: lowercase-initial identifiers, plus
/// the handful of structural atoms the reader accepts bare.
fn atom_is_plain(name: &str) -> bool {
    matches!(name, "[]" | "!" | ";" | "{}")
        || {
            let mut chars = name.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
}

/// Float spelling: shortest round-trip decimal, with the engine's special
/// forms for infinities, NaN, and whole values.
pub fn fmt_float(f: f64) -> String {
    if f.is_nan() {
        "1.5NaN".to_string()
    } else if f == f64::INFINITY {
        "1.0Inf".to_string()
    } else if f == f64::NEG_INFINITY {
        "-1.0Inf".to_string()
    } else if f == f.trunc() && f.abs() <= 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Process a `format/1,2` control string against its argument list.
///
/// `~w ~d ~f ~a ~s ~n ~~` are honored; any other directive copies
/// literally. Running out of arguments is a type error.
pub fn format_directives(
    out: &mut dyn Write,
    control: &[u8],
    args: &[TermId],
    env: &Env,
    terms: &TermStore,
    symbols: &SymbolStore,
    ns: &Names,
) -> Result<(), Error> {
    let mut next_arg = 0;
    let mut take = |next_arg: &mut usize| -> Result<TermId, Error> {
        let i = *next_arg;
        if i >= args.len() {
            return Err(Error::Type("format: not enough arguments".into()));
        }
        *next_arg = i + 1;
        Ok(args[i])
    };

    let mut bytes = control.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b != b'~' {
            out.write_all(&[b])?;
            continue;
        }
        match bytes.next() {
            Some(b'w') => {
                let arg = take(&mut next_arg)?;
                write_term(out, arg, env, terms, symbols, ns)?;
            }
            Some(b'd') => {
                let arg = env.resolve(take(&mut next_arg)?, terms);
                match terms.get(arg) {
                    Some(Term::Int(i)) => write!(out, "{}", i)?,
                    _ => return Err(Error::Type("format ~d: integer expected".into())),
                }
            }
            Some(b'f') => {
                let arg = env.resolve(take(&mut next_arg)?, terms);
                match terms.get(arg) {
                    Some(Term::Int(i)) => write!(out, "{}", fmt_float(i as f64))?,
                    Some(Term::Float(bits)) => {
                        write!(out, "{}", fmt_float(f64::from_bits(bits)))?
                    }
                    _ => return Err(Error::Type("format ~f: number expected".into())),
                }
            }
            Some(b'a') => {
                let arg = env.resolve(take(&mut next_arg)?, terms);
                match terms.get(arg) {
                    Some(Term::Atom(name)) => {
                        write!(out, "{}", symbols.resolve(name).unwrap_or("?"))?
                    }
                    _ => return Err(Error::Type("format ~a: atom expected".into())),
                }
            }
            Some(b's') => {
                let arg = env.resolve(take(&mut next_arg)?, terms);
                match terms.get(arg) {
                    Some(Term::Str(s)) => out.write_all(&s)?,
                    Some(Term::Atom(name)) => {
                        write!(out, "{}", symbols.resolve(name).unwrap_or("?"))?
                    }
                    _ => return Err(Error::Type("format ~s: string expected".into())),
                }
            }
            Some(b'n') => out.write_all(b"\n")?,
            Some(b'~') => out.write_all(b"~")?,
            Some(other) => {
                out.write_all(b"~")?;
                out.write_all(&[other])?;
            }
            None => out.write_all(b"~")?,
        }
    }
    Ok(())
}

/// The control-string bytes of a `format` first argument (atom or string).
pub fn control_bytes(
    t: TermId,
    env: &Env,
    terms: &TermStore,
    symbols: &SymbolStore,
) -> Result<Vec<u8>, Error> {
    let t = env.resolve(t, terms);
    match terms.get(t) {
        Some(Term::Atom(name)) => Ok(symbols
            .resolve(name)
            .unwrap_or_default()
            .as_bytes()
            .to_vec()),
        Some(Term::Str(bytes)) => Ok(bytes.to_vec()),
        _ => Err(Error::Type("format: atom or string control expected".into())),
    }
}

/// Collect the argument list of `format/2` (a proper list).
pub fn format_args(
    t: TermId,
    env: &Env,
    terms: &TermStore,
    ns: &Names,
) -> Result<Vec<TermId>, Error> {
    collect_proper_list(t, env, terms, ns)
        .ok_or_else(|| Error::Type("format: proper argument list expected".into()))
}

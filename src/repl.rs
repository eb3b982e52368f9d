//! REPL (Read-Eval-Print Loop) for interactive queries.
//!
//! Reads `?- `-style queries, prints one binding line per solution, and
//! `  false.` when a query finishes without any. Incomplete input (no
//! closing `.`) gets a continuation prompt. Input lines are appended to a
//! history file so a session survives restarts.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::engine::{Engine, LoadError};
use crate::env::Env;
use crate::parser::ReadError;
use crate::term::{Term, TermId};

/// Default name of the persisted input history, in the working directory.
pub const HISTORY_FILE: &str = ".sldlog_history";

/// How many history entries the `history` command shows.
const HISTORY_SHOWN: usize = 20;

/// What the caller should do after a processed line.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplAction {
    /// Keep reading.
    Continue,
    /// The line was incomplete; prompt for a continuation.
    NeedMore,
    /// The user asked to leave.
    Quit,
}

/// The REPL state and configuration.
pub struct Repl {
    engine: Engine,
    prompt: String,
    verbose: bool,
    history_path: PathBuf,
    history: Vec<String>,
    pending: String,
}

impl Repl {
    /// Create a REPL with default settings.
    pub fn new() -> Self {
        Self::with_engine(Engine::new())
    }

    /// Create a REPL around a preconfigured engine.
    pub fn with_engine(engine: Engine) -> Self {
        Self {
            engine,
            prompt: "?- ".to_string(),
            verbose: false,
            history_path: PathBuf::from(HISTORY_FILE),
            history: Vec::new(),
            pending: String::new(),
        }
    }

    /// Set the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Print per-query metrics after each query.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Use a different history file location.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Run the loop over the given streams until EOF or `halt.`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> io::Result<()> {
        self.load_history();
        writeln!(output, "sldlog - SLD resolution with first-argument indexing")?;
        writeln!(output, "Type 'help.' for usage, 'halt.' to exit.")?;

        loop {
            if self.pending.is_empty() {
                write!(output, "{}", self.prompt)?;
            } else {
                write!(output, "|    ")?;
            }
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                break;
            }
            self.remember(&line);

            match self.process_line(&line, output)? {
                ReplAction::Continue | ReplAction::NeedMore => {}
                ReplAction::Quit => break,
            }
        }
        Ok(())
    }

    /// Feed one input line. Incomplete terms accumulate until a `.` lands.
    pub fn process_line<W: Write>(
        &mut self,
        line: &str,
        output: &mut W,
    ) -> io::Result<ReplAction> {
        self.pending.push_str(line);
        let text = self.pending.trim().to_string();
        if text.is_empty() {
            self.pending.clear();
            return Ok(ReplAction::Continue);
        }

        match text.as_str() {
            "halt" | "halt." | "quit" | "quit." => {
                self.pending.clear();
                return Ok(ReplAction::Quit);
            }
            "help" | "help." => {
                self.pending.clear();
                writeln!(output, "{}", Self::help_text())?;
                return Ok(ReplAction::Continue);
            }
            "history" | "history." => {
                self.pending.clear();
                let start = self.history.len().saturating_sub(HISTORY_SHOWN);
                for entry in &self.history[start..] {
                    writeln!(output, "  {}", entry)?;
                }
                return Ok(ReplAction::Continue);
            }
            _ => {}
        }

        let (goals, vars) = match self.engine.read_query(&text) {
            Ok(parsed) => parsed,
            Err(LoadError::Read(ReadError::UnexpectedEof)) => {
                // Wait for the closing dot.
                return Ok(ReplAction::NeedMore);
            }
            Err(e) => {
                self.pending.clear();
                writeln!(output, "error: {}", e)?;
                return Ok(ReplAction::Continue);
            }
        };
        self.pending.clear();

        if self.is_halt(&goals) {
            return Ok(ReplAction::Quit);
        }

        if let Some(files) = self.consult_targets(&goals) {
            for file in files {
                self.consult_file(&file, output)?;
            }
            return Ok(ReplAction::Continue);
        }

        self.run_goals(&goals, &vars, output)?;
        Ok(ReplAction::Continue)
    }

    fn run_goals<W: Write>(
        &mut self,
        goals: &[TermId],
        vars: &[(String, TermId)],
        output: &mut W,
    ) -> io::Result<()> {
        use crate::error::Error;
        use crate::solve::{Handled, Handler, SolveCtx};

        struct Collect<'v> {
            vars: &'v [(String, TermId)],
            rows: Vec<String>,
        }
        impl Handler for Collect<'_> {
            fn solution(&mut self, env: &Env, ctx: &mut SolveCtx<'_>) -> Result<Handled, Error> {
                let line = self
                    .vars
                    .iter()
                    .map(|(name, var)| format!("{} = {}", name, ctx.render(*var, env)))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.rows.push(line);
                Ok(Handled::Continue)
            }
        }

        self.engine.metrics().reset();
        let mut collect = Collect {
            vars,
            rows: Vec::new(),
        };
        let mut env = Env::new();
        match self.engine.solve(goals, &mut env, &mut collect) {
            Ok(()) => {
                if collect.rows.is_empty() {
                    writeln!(output, "  false.")?;
                } else {
                    for row in &collect.rows {
                        if row.is_empty() {
                            writeln!(output, "  true.")?;
                        } else {
                            writeln!(output, "{}", row)?;
                        }
                    }
                }
                if self.verbose {
                    writeln!(output, "% {}", self.engine.metrics().snapshot())?;
                }
            }
            Err(e) => {
                writeln!(output, "error: {}", e)?;
            }
        }
        Ok(())
    }

    fn is_halt(&self, goals: &[TermId]) -> bool {
        if goals.len() != 1 {
            return false;
        }
        matches!(
            self.engine.terms().get(goals[0]),
            Some(Term::Atom(name)) if name == self.engine.names().halt
        )
    }

    /// `consult('file')`, `consult(file)`, or `['file', ...]` queries.
    fn consult_targets(&self, goals: &[TermId]) -> Option<Vec<String>> {
        if goals.len() != 1 {
            return None;
        }
        let terms = self.engine.terms();
        let ns = self.engine.names();
        match terms.get(goals[0])? {
            Term::Compound(functor, args) if functor == ns.consult && args.len() == 1 => {
                let name = self.atom_text(args[0])?;
                Some(vec![name])
            }
            Term::Compound(functor, args) if functor == ns.dot && args.len() == 2 => {
                let items =
                    crate::env::collect_proper_list(goals[0], &Env::new(), terms, ns)?;
                let mut files = Vec::with_capacity(items.len());
                for item in items {
                    files.push(self.atom_text(item)?);
                }
                Some(files)
            }
            _ => None,
        }
    }

    fn atom_text(&self, t: TermId) -> Option<String> {
        match self.engine.terms().get(t)? {
            Term::Atom(name) => self.engine.symbols().resolve(name).map(str::to_string),
            Term::Str(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            _ => None,
        }
    }

    fn consult_file<W: Write>(&mut self, path: &str, output: &mut W) -> io::Result<()> {
        let src = match fs::read_to_string(path) {
            Ok(src) => src,
            Err(e) => {
                writeln!(output, "error: cannot read {}: {}", path, e)?;
                return Ok(());
            }
        };
        match self.engine.consult_str(&src) {
            Ok(n) => writeln!(output, "% loaded {} clause(s) from {}", n, path)?,
            Err(e) => writeln!(output, "error in {}: {}", path, e)?,
        }
        Ok(())
    }

    fn load_history(&mut self) {
        if let Ok(text) = fs::read_to_string(&self.history_path) {
            self.history
                .extend(text.lines().map(str::to_string).filter(|l| !l.is_empty()));
        }
    }

    fn remember(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        self.history.push(trimmed.to_string());
        // History persistence is best-effort; a read-only directory should
        // not take the session down.
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
        {
            let _ = writeln!(file, "{}", trimmed);
        }
    }

    fn help_text() -> String {
        [
            "Queries end with a dot: ?- parent(X, mary).",
            "  consult('file.pl').  load a program file",
            "  ['file.pl'].         same",
            "  history.             show recent input",
            "  halt.                leave",
        ]
        .join("\n")
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

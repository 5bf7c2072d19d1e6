use super::ast::{MacroDef, ParamKind, Stmt, StmtKind};
use crate::error::Error;
use crate::expr::ast::{Value, ValueType};
use crate::expr::lexer::LineLexer;
use crate::expr::token::{Pos, TokenKind};
use crate::expr::ast::ExprKind;
use crate::expr::{eval_const, evaluate, parser, Env, Expr};

/// Actual argument text of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(String),
    Named(String, String),
}

impl Arg {
    /// `key = value` or a plain value.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        let key_len = text
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .map(char::len_utf8)
            .sum::<usize>();
        if key_len > 0 && !text.starts_with(|c: char| c.is_ascii_digit()) {
            let rest = text[key_len..].trim_start();
            if let Some(value) = rest.strip_prefix('=') {
                if !value.starts_with('=') {
                    return Arg::Named(text[..key_len].to_string(), value.trim().to_string());
                }
            }
        }
        Arg::Positional(text.to_string())
    }
}

/// Run `def` with `args` and return the emitted lines.
///
/// `invocation` is the value `uniqueG()` yields; `max_iterations` bounds the
/// loop iterations of this invocation.
pub fn expand(
    def: &MacroDef,
    args: &[Arg],
    max_iterations: usize,
    invocation: i64,
) -> Result<Vec<String>, Error> {
    let mut env = Env::for_invocation(invocation);
    for (param, value) in def.params.iter().zip(bind(def, args)?) {
        env.declare(&param.name, value);
    }
    let mut machine = Machine {
        env,
        out: Vec::new(),
        iterations: 0,
        limit: max_iterations,
    };
    machine.block(&def.body)?;
    Ok(machine.out)
}

// ----------------------------------------------------------------------------
// Argument binding
// ----------------------------------------------------------------------------

fn bind(def: &MacroDef, args: &[Arg]) -> Result<Vec<Value>, Error> {
    let count_error = |detail: String| Error::ArgumentCountMismatch(def.name.clone(), detail);

    let mut texts: Vec<Option<&str>> = vec![None; def.params.len()];
    let mut positional = 0;
    for arg in args {
        match arg {
            Arg::Positional(text) => {
                if positional >= def.params.len() {
                    return Err(count_error(format!(
                        "expected at most {}, found {}",
                        def.params.len(),
                        args.len()
                    )));
                }
                texts[positional] = Some(text.as_str());
                positional += 1;
            }
            Arg::Named(key, text) => {
                let idx = def
                    .params
                    .iter()
                    .position(|p| &p.name == key)
                    .ok_or_else(|| count_error(format!("no parameter named `{key}`")))?;
                if texts[idx].is_some() {
                    return Err(count_error(format!("parameter `{key}` given twice")));
                }
                texts[idx] = Some(text.as_str());
            }
        }
    }

    let mut values = Vec::new();
    for (param, text) in def.params.iter().zip(texts) {
        let value = match (text, &param.default) {
            (Some(text), _) => bind_one(&param.name, param.kind, text)?,
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(count_error(format!("missing argument `{}`", param.name)));
            }
        };
        values.push(value);
    }
    Ok(values)
}

fn bind_one(name: &str, kind: ParamKind, text: &str) -> Result<Value, Error> {
    let mismatch = || Error::ArgumentTypeMismatch(name.to_string(), kind.to_string(), text.to_string());
    match kind {
        ParamKind::Value(ty) => {
            let value = eval_const(text, Pos::default()).map_err(|e| e.error)?;
            value.coerce(ty).ok_or_else(mismatch)
        }
        ParamKind::Type => {
            let name = string_literal(text).unwrap_or_else(|| text.to_string());
            if is_type_name(&name) {
                Ok(Value::Str(name))
            } else {
                Err(mismatch())
            }
        }
        ParamKind::Block => Ok(Value::Str(
            string_literal(text).unwrap_or_else(|| text.to_string()),
        )),
    }
}

fn string_literal(text: &str) -> Option<String> {
    let tokens = LineLexer::new(text, 0, 0).parse();
    match tokens.as_slice() {
        [token] => match &token.kind {
            TokenKind::Text(s) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// `int`, `java.lang.String`, `String[][]`
pub fn is_type_name(text: &str) -> bool {
    let base = text.trim_end_matches("[]");
    if base.contains('[') || base.contains(']') || base.is_empty() {
        return false;
    }
    base.split('.').all(|seg| {
        let mut chars = seg.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
                chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            }
            _ => false,
        }
    })
}

// ----------------------------------------------------------------------------
// Interpreter
// ----------------------------------------------------------------------------

enum Flow {
    Normal,
    Break,
    Continue,
    Exit,
}

struct Machine {
    env: Env,
    out: Vec<String>,
    iterations: usize,
    limit: usize,
}

impl Machine {
    fn tick(&mut self) -> Result<(), Error> {
        self.iterations += 1;
        if self.iterations > self.limit {
            return Err(Error::MacroExpansionLimitExceeded(self.limit));
        }
        Ok(())
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<Flow, Error> {
        for stmt in stmts {
            match self.stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn truth(&mut self, expr: &crate::expr::Expr) -> Result<bool, Error> {
        match evaluate(expr, &mut self.env)? {
            Value::Bool(b) => Ok(b),
            v => Err(Error::mismatch(ValueType::Bool, v.ty())),
        }
    }

    fn int(&mut self, expr: &crate::expr::Expr) -> Result<i64, Error> {
        match evaluate(expr, &mut self.env)? {
            Value::Int(n) => Ok(n),
            v => Err(Error::mismatch(ValueType::Int, v.ty())),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Flow, Error> {
        match &stmt.kind {
            StmtKind::Var(name, ty, init) => {
                let value = match init {
                    Some(init) => {
                        let value = evaluate(init, &mut self.env)?;
                        let found = value.ty();
                        value.coerce(*ty).ok_or_else(|| Error::mismatch(ty, found))?
                    }
                    None => zero(*ty),
                };
                self.env.declare(name, value);
            }
            StmtKind::Expr(expr) => {
                evaluate(expr, &mut self.env)?;
            }
            StmtKind::If(cond, then, other) => {
                return if self.truth(cond)? {
                    self.block(then)
                } else {
                    self.block(other)
                };
            }
            StmtKind::While(cond, body) => {
                while self.truth(cond)? {
                    self.tick()?;
                    match self.block(body)? {
                        Flow::Break => break,
                        Flow::Exit => return Ok(Flow::Exit),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For {
                var,
                from,
                to,
                step,
                body,
            } => {
                let mut i = self.int(from)?;
                let to = self.int(to)?;
                let step = match step {
                    Some(step) => self.int(step)?,
                    None => 1,
                };
                if step == 0 {
                    return Err(Error::ArithmeticError("zero step in for loop".into()));
                }
                if !self.env.exists(var) {
                    self.env.declare(var, Value::Int(i));
                }
                while (step > 0 && i <= to) || (step < 0 && i >= to) {
                    self.tick()?;
                    self.env.set(var, Value::Int(i))?;
                    match self.block(body)? {
                        Flow::Break => break,
                        Flow::Exit => return Ok(Flow::Exit),
                        Flow::Normal | Flow::Continue => {}
                    }
                    i = match i.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
            }
            StmtKind::Emit(expr) => {
                let mut expr = expr.clone();
                self.interpolate_literals(&mut expr)?;
                let text = evaluate(&expr, &mut self.env)?.to_string();
                self.out.extend(text.lines().map(|l| l.to_string()));
            }
            StmtKind::Error(expr) => {
                let message = evaluate(expr, &mut self.env)?.to_string();
                return Err(Error::MacroError(message));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Normal)
    }

    /// Interpolate the string literals of an `emit` operand in place.
    ///
    /// Values reaching the operand through variables and arguments are
    /// emitted as they are.
    fn interpolate_literals(&mut self, expr: &mut Expr) -> Result<(), Error> {
        match &mut expr.kind {
            ExprKind::Literal(Value::Str(s)) => {
                let text = self.interpolate(s)?;
                *s = text;
            }
            ExprKind::Literal(_) | ExprKind::Variable(_) => {}
            ExprKind::Unary(_, e) => self.interpolate_literals(e)?,
            ExprKind::Binary(_, a, b) | ExprKind::Assign(a, b) => {
                self.interpolate_literals(a)?;
                self.interpolate_literals(b)?;
            }
            ExprKind::Cond(c, a, b) => {
                self.interpolate_literals(c)?;
                self.interpolate_literals(a)?;
                self.interpolate_literals(b)?;
            }
            ExprKind::Call(_, args) => {
                for arg in args.iter_mut() {
                    self.interpolate_literals(arg)?;
                }
            }
        }
        Ok(())
    }

    /// Substitute `&name` and `&{expr}`; `&&` stands for a literal `&`.
    fn interpolate(&mut self, text: &str) -> Result<String, Error> {
        let mut out = String::new();
        let mut iter = text.char_indices().peekable();
        while let Some((_, ch)) = iter.next() {
            if ch != '&' {
                out.push(ch);
                continue;
            }
            match iter.peek().copied() {
                Some((_, '&')) => {
                    iter.next();
                    out.push('&');
                }
                Some((start, '{')) => {
                    iter.next();
                    let mut depth = 1;
                    let mut end = None;
                    for (idx, c) in iter.by_ref() {
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    end = Some(idx);
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    let end = end.ok_or_else(|| Error::UnexpectedToken("&{".into()))?;
                    let expr = parser::parse(&text[start + 1..end], Pos::default())
                        .map_err(|e| e.error)?;
                    out.push_str(&evaluate(&expr, &mut self.env)?.to_string());
                }
                Some((_, c)) if c.is_alphabetic() || c == '_' || c == '$' => {
                    let mut name = String::new();
                    while let Some((_, c)) =
                        iter.next_if(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '$')
                    {
                        name.push(c);
                    }
                    out.push_str(&self.env.get(&name)?.to_string());
                }
                _ => out.push('&'),
            }
        }
        Ok(out)
    }
}

fn zero(ty: ValueType) -> Value {
    match ty {
        ValueType::Int => Value::Int(0),
        ValueType::Real => Value::Real(0.0),
        ValueType::Str => Value::Str(String::new()),
        ValueType::Bool => Value::Bool(false),
    }
}

use super::ast::{MacroDef, Param, ParamKind, Stmt, StmtKind};
use crate::error::{Error, Located};
use crate::expr::ast::{BinaryOp, Expr, ExprKind, UnaryOp, ValueType};
use crate::expr::eval::{builtin_type, evaluate};
use crate::expr::lexer::tokenize;
use crate::expr::parsercore::Parser;
use crate::expr::token::{Pos, Token, TokenKind::*};
use crate::expr::Env;
use crate::{check, expect, optional, repeat};
use indexmap::IndexMap;

/// Compile one macro definition; `first_line` is the line its text starts on.
pub fn compile(source: &str, first_line: usize) -> Result<MacroDef, Located> {
    let tokens = tokenize(source, first_line);
    let mut parser = Parser::new(tokens.into_iter());
    let mut def = parser.parse_macro()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Checker::new().check(&mut def)?;
    Ok(def)
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

impl<I: Iterator<Item = Token>> Parser<I> {
    /// macro = "macro" ident "(" [ param { "," param } ] ")" block
    fn parse_macro(&mut self) -> Result<MacroDef, Located> {
        let start = expect!(self, KwMacro)?;
        let name = self.parse_ident()?;
        expect!(self, LParen)?;
        let params = repeat!(self, self.parse_param(), Comma, RParen);
        expect!(self, RParen)?;
        let body = self.parse_block()?;
        Ok(MacroDef {
            name,
            params,
            body,
            pos: start.pos,
        })
    }

    fn parse_ident(&mut self) -> Result<String, Located> {
        let token = expect!(self, Ident(_))?;
        match token.kind {
            Ident(name) => Ok(name),
            _ => Err(self.unexpected()),
        }
    }

    /// param = ident ":" ( "int" | "real" | "str" | "bool" | "type" | "block" ) [ "=" expr ]
    fn parse_param(&mut self) -> Result<Param, Located> {
        let pos = self.peek().map(|t| t.pos).unwrap_or(self.pos());
        let name = self.parse_ident()?;
        expect!(self, Colon)?;
        let kind_pos = self.peek().map(|t| t.pos).unwrap_or(self.pos());
        let kind = self.parse_ident()?;
        let kind = ParamKind::parse(&kind).ok_or_else(|| Error::InvalidType(kind).at(kind_pos))?;
        let default = optional!(self, Equal, self.parse_expr()?);
        let default = match default {
            Some(expr) => {
                let value = evaluate(&expr, &mut Env::new()).map_err(|e| e.at(expr.pos))?;
                let found = value.ty();
                let value = value
                    .coerce(kind.value_type())
                    .ok_or_else(|| Error::mismatch(kind, found).at(expr.pos))?;
                Some(value)
            }
            None => None,
        };
        Ok(Param {
            name,
            kind,
            default,
            pos,
        })
    }

    /// block = "{" { stmt } "}"
    fn parse_block(&mut self) -> Result<Vec<Stmt>, Located> {
        expect!(self, LCurly)?;
        let stmts = repeat!(self, self.parse_stmt(), RCurly);
        expect!(self, RCurly)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Located> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };
        let pos = token.pos;
        let kind = match token.kind {
            // var-stmt = "var" ident ":" vtype [ "=" expr ] ";"
            KwVar => {
                expect!(self, KwVar)?;
                let name = self.parse_ident()?;
                expect!(self, Colon)?;
                let ty_pos = self.peek().map(|t| t.pos).unwrap_or(pos);
                let ty = self.parse_ident()?;
                let ty = ty
                    .parse::<ValueType>()
                    .map_err(|_| Error::InvalidType(ty).at(ty_pos))?;
                let init = optional!(self, Equal, self.parse_expr()?);
                expect!(self, Semicolon)?;
                StmtKind::Var(name, ty, init)
            }

            // if-stmt = "if" "(" expr ")" block [ "else" ( block | if-stmt ) ]
            KwIf => {
                expect!(self, KwIf)?;
                expect!(self, LParen)?;
                let cond = self.parse_expr()?;
                expect!(self, RParen)?;
                let then = self.parse_block()?;
                let other = if optional!(self, KwElse).is_some() {
                    if check!(self, KwIf) {
                        vec![self.parse_stmt()?]
                    } else {
                        self.parse_block()?
                    }
                } else {
                    vec![]
                };
                StmtKind::If(cond, then, other)
            }

            // while-stmt = "while" "(" expr ")" block
            KwWhile => {
                expect!(self, KwWhile)?;
                expect!(self, LParen)?;
                let cond = self.parse_expr()?;
                expect!(self, RParen)?;
                let body = self.parse_block()?;
                StmtKind::While(cond, body)
            }

            // for-stmt = "for" ident "=" expr "to" expr [ "step" expr ] block
            KwFor => {
                expect!(self, KwFor)?;
                let var = self.parse_ident()?;
                expect!(self, Equal)?;
                let from = self.parse_cond_only()?;
                expect!(self, KwTo)?;
                let to = self.parse_cond_only()?;
                let step = optional!(self, KwStep, self.parse_cond_only()?);
                let body = self.parse_block()?;
                StmtKind::For {
                    var,
                    from,
                    to,
                    step,
                    body,
                }
            }

            // emit-stmt = "emit" expr ";"
            KwEmit => {
                expect!(self, KwEmit)?;
                let expr = self.parse_expr()?;
                expect!(self, Semicolon)?;
                StmtKind::Emit(expr)
            }

            // error-stmt = "error" expr ";"
            KwError => {
                expect!(self, KwError)?;
                let expr = self.parse_expr()?;
                expect!(self, Semicolon)?;
                StmtKind::Error(expr)
            }

            KwBreak => {
                expect!(self, KwBreak)?;
                expect!(self, Semicolon)?;
                StmtKind::Break
            }

            KwContinue => {
                expect!(self, KwContinue)?;
                expect!(self, Semicolon)?;
                StmtKind::Continue
            }

            KwExit => {
                expect!(self, KwExit)?;
                expect!(self, Semicolon)?;
                StmtKind::Exit
            }

            // expr-stmt = expr ";"
            _ => {
                let expr = self.parse_expr()?;
                expect!(self, Semicolon)?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, pos })
    }

    /// Loop bounds may not contain a bare assignment
    fn parse_cond_only(&mut self) -> Result<Expr, Located> {
        let expr = self.parse_expr()?;
        if let ExprKind::Assign(_, _) = expr.kind {
            return Err(Error::InvalidAssignmentTarget.at(expr.pos));
        }
        Ok(expr)
    }
}

// ----------------------------------------------------------------------------
// Checker
// ----------------------------------------------------------------------------

struct Checker {
    scopes: Vec<IndexMap<String, ValueType>>,
    loops: usize,
}

impl Checker {
    fn new() -> Self {
        Self {
            scopes: vec![],
            loops: 0,
        }
    }

    fn check(&mut self, def: &mut MacroDef) -> Result<(), Located> {
        let mut params = IndexMap::new();
        let mut seen_default = false;
        for param in &def.params {
            if params.contains_key(&param.name) {
                return Err(Error::DuplicateParameter(param.name.clone()).at(param.pos));
            }
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(Error::RequiredAfterDefault(param.name.clone()).at(param.pos));
            }
            params.insert(param.name.clone(), param.kind.value_type());
        }
        self.scopes.push(params);
        self.block(&mut def.body)?;
        self.scopes.pop();
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<ValueType> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn declare(&mut self, name: &str, ty: ValueType, pos: Pos) -> Result<(), Located> {
        if self.lookup(name).is_some() {
            return Err(Error::DuplicateVariable(name.to_string()).at(pos));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
        Ok(())
    }

    fn block(&mut self, stmts: &mut [Stmt]) -> Result<(), Located> {
        self.scopes.push(IndexMap::new());
        let mut diverged = false;
        for stmt in stmts.iter_mut() {
            if diverged {
                return Err(Error::UnreachableStatement.at(stmt.pos));
            }
            self.stmt(stmt)?;
            diverged = stmt.kind.diverges();
        }
        self.scopes.pop();
        Ok(())
    }

    fn expect(&mut self, expr: &mut Expr, ty: ValueType) -> Result<(), Located> {
        let found = self.expr(expr)?;
        if ty.accepts(found) {
            Ok(())
        } else {
            Err(Error::mismatch(ty, found).at(expr.pos))
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> Result<(), Located> {
        let pos = stmt.pos;
        match &mut stmt.kind {
            StmtKind::Var(name, ty, init) => {
                if let Some(init) = init {
                    self.expect(init, *ty)?;
                }
                self.declare(name, *ty, pos)
            }
            StmtKind::Expr(expr) | StmtKind::Emit(expr) => self.expr(expr).map(|_| ()),
            StmtKind::Error(expr) => self.expect(expr, ValueType::Str),
            StmtKind::If(cond, then, other) => {
                self.expect(cond, ValueType::Bool)?;
                self.block(then)?;
                self.block(other)
            }
            StmtKind::While(cond, body) => {
                self.expect(cond, ValueType::Bool)?;
                self.loops += 1;
                let result = self.block(body);
                self.loops -= 1;
                result
            }
            StmtKind::For {
                var,
                from,
                to,
                step,
                body,
            } => {
                self.expect(from, ValueType::Int)?;
                self.expect(to, ValueType::Int)?;
                if let Some(step) = step {
                    self.expect(step, ValueType::Int)?;
                }
                let scoped = match self.lookup(var) {
                    Some(ValueType::Int) => false,
                    Some(found) => return Err(Error::mismatch(ValueType::Int, found).at(pos)),
                    None => {
                        let mut scope = IndexMap::new();
                        scope.insert(var.clone(), ValueType::Int);
                        self.scopes.push(scope);
                        true
                    }
                };
                self.loops += 1;
                let result = self.block(body);
                self.loops -= 1;
                if scoped {
                    self.scopes.pop();
                }
                result
            }
            StmtKind::Break if self.loops == 0 => Err(Error::OutsideLoop("break".into()).at(pos)),
            StmtKind::Continue if self.loops == 0 => {
                Err(Error::OutsideLoop("continue".into()).at(pos))
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Exit => Ok(()),
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<ValueType, Located> {
        use ValueType::{Bool, Int, Real, Str};
        let pos = expr.pos;
        let numeric = |a: ValueType, b: ValueType| match (a, b) {
            (Int, Int) => Some(Int),
            (Int | Real, Int | Real) => Some(Real),
            _ => None,
        };
        let ty = match &mut expr.kind {
            ExprKind::Literal(value) => value.ty(),
            ExprKind::Variable(name) => self
                .lookup(name)
                .ok_or_else(|| Error::UnboundSymbol(name.clone()).at(pos))?,
            ExprKind::Unary(op, operand) => {
                let ty = self.expr(operand)?;
                match (op, ty) {
                    (UnaryOp::Neg, Int | Real) => ty,
                    (UnaryOp::Not, Bool) => Bool,
                    (UnaryOp::Neg, _) => return Err(Error::mismatch("int or real", ty).at(pos)),
                    (UnaryOp::Not, _) => return Err(Error::mismatch(Bool, ty).at(pos)),
                }
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let a = self.expr(lhs)?;
                let b = self.expr(rhs)?;
                let bad = |expected: &str| Error::mismatch(expected, format!("{a} and {b}")).at(pos);
                match op {
                    BinaryOp::Concat => Str,
                    BinaryOp::Add if a == Str || b == Str => Str,
                    BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Rem => numeric(a, b).ok_or_else(|| bad("int or real"))?,
                    BinaryOp::And
                    | BinaryOp::Or
                    | BinaryOp::Xor
                    | BinaryOp::Shl
                    | BinaryOp::Shr => match (a, b) {
                        (Int, Int) => Int,
                        _ => return Err(bad("int")),
                    },
                    BinaryOp::Eq | BinaryOp::Ne => {
                        if a == b || numeric(a, b).is_some() {
                            Bool
                        } else {
                            return Err(bad("operands of the same type"));
                        }
                    }
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                        if (a == Str && b == Str) || numeric(a, b).is_some() {
                            Bool
                        } else {
                            return Err(bad("numbers or strings"));
                        }
                    }
                    BinaryOp::LogAnd | BinaryOp::LogOr => match (a, b) {
                        (Bool, Bool) => Bool,
                        _ => return Err(bad("bool")),
                    },
                }
            }
            ExprKind::Assign(target, value) => {
                let ExprKind::Variable(name) = &target.kind else {
                    return Err(Error::InvalidAssignmentTarget.at(target.pos));
                };
                let slot = self
                    .lookup(name)
                    .ok_or_else(|| Error::UnboundSymbol(name.clone()).at(target.pos))?;
                target.ty = Some(slot);
                let found = self.expr(value)?;
                if !slot.accepts(found) {
                    return Err(Error::mismatch(slot, found).at(value.pos));
                }
                slot
            }
            ExprKind::Cond(cond, then, other) => {
                self.expect(cond, Bool)?;
                let a = self.expr(then)?;
                let b = self.expr(other)?;
                if a == b {
                    a
                } else {
                    numeric(a, b).ok_or_else(|| Error::mismatch(a, b).at(other.pos))?
                }
            }
            ExprKind::Call(name, args) => {
                let name = name.as_str();
                let (arity, ty) = builtin_type(name)
                    .ok_or_else(|| Error::UnknownFunction(name.to_string()).at(pos))?;
                if args.len() != arity {
                    return Err(Error::ArgumentCountMismatch(
                        name.to_string(),
                        format!("expected {arity}, found {}", args.len()),
                    )
                    .at(pos));
                }
                for arg in args.iter_mut() {
                    // `exists` takes a bare name that need not be bound
                    if name == "exists" && matches!(arg.kind, ExprKind::Variable(_)) {
                        continue;
                    }
                    let found = self.expr(arg)?;
                    if (name == "len" || name == "exists") && found != Str {
                        return Err(Error::mismatch(Str, found).at(arg.pos));
                    }
                }
                ty
            }
        };
        expr.ty = Some(ty);
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::Value;

    fn ok(src: &str) -> MacroDef {
        match compile(src, 1) {
            Ok(def) => def,
            Err(e) => panic!("{} at {}", e.error, e.pos),
        }
    }

    fn err(src: &str) -> Located {
        compile(src, 1).expect_err("compile should fail")
    }

    #[test]
    fn params_and_body() {
        let def = ok("macro push(n: int, t: type, b: block = \"nop\") {\n  emit \"bipush \" # n;\n}");
        assert_eq!(def.name, "push");
        assert_eq!(def.params.len(), 3);
        assert_eq!(def.params[2].default, Some(Value::Str("nop".into())));
        assert_eq!(def.required(), 2);
        assert_eq!(def.signature(), "push(n:int, t:type, b:block = nop)");
        assert_eq!(def.body[0].pos, Pos::new(2, 3));
    }

    #[test]
    fn loops_and_branches() {
        ok("macro m(n: int) {
              var i: int = 0;
              while (i < n) { i = i + 1; if (i == 2) { continue; } else if (i > 5) { break; } }
              for j = 1 to n step 2 { emit \"nop\"; }
              for j = n to 0 step -1 { emit str(j); }
              exit;
            }");
    }

    #[test]
    fn default_is_widened() {
        let def = ok("macro m(r: real = 1) { }");
        assert_eq!(def.params[0].default, Some(Value::Real(1.0)));
    }

    #[test]
    fn rejects() {
        assert!(matches!(
            err("macro m(a: int, a: int) { }").error,
            Error::DuplicateParameter(_)
        ));
        assert!(matches!(
            err("macro m(a: int = 1, b: int) { }").error,
            Error::RequiredAfterDefault(_)
        ));
        assert!(matches!(
            err("macro m(a: int = \"x\") { }").error,
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            err("macro m() { var x: int; var x: str; }").error,
            Error::DuplicateVariable(_)
        ));
        assert!(matches!(
            err("macro m() { 1 = 2; }").error,
            Error::InvalidAssignmentTarget
        ));
        assert!(matches!(
            err("macro m() { y = 2; }").error,
            Error::UnboundSymbol(_)
        ));
        assert!(matches!(
            err("macro m() { if (1) { } }").error,
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            err("macro m() { for i = 0 to 1.5 { } }").error,
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            err("macro m() { error 1; }").error,
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            err("macro m() { break; }").error,
            Error::OutsideLoop(_)
        ));
        assert!(matches!(
            err("macro m() { exit; emit \"nop\"; }").error,
            Error::UnreachableStatement
        ));
        assert!(matches!(
            err("macro m(a: float) { }").error,
            Error::InvalidType(_)
        ));
    }

    #[test]
    fn error_positions() {
        let e = err("macro m() {\n  emit nope;\n}");
        assert!(matches!(e.error, Error::UnboundSymbol(_)));
        assert_eq!(e.pos, Pos::new(2, 8));

        let e = compile("macro m() {\n emit 1", 10).unwrap_err();
        assert!(matches!(e.error, Error::UnexpectedEOF));
        assert_eq!(e.pos.line, 11);
    }

    #[test]
    fn block_scopes() {
        ok("macro m(c: bool) { if (c) { var x: int; } else { var x: str; } }");
        assert!(matches!(
            err("macro m(c: bool) { if (c) { var x: int; } emit x; }").error,
            Error::UnboundSymbol(_)
        ));
    }
}

use super::ast::{BinaryOp, Expr, ExprKind, UnaryOp, Value};
use super::lexer::LineLexer;
use super::parsercore::Parser;
use super::token::{Pos, Token, TokenKind::*};
use crate::error::Located;
use crate::{check, expect, repeat};

/// Parse a single expression written on one line starting at `pos`.
pub fn parse(text: &str, pos: Pos) -> Result<Expr, Located> {
    let tokens = LineLexer::new(text, pos.line, pos.column).parse();
    let mut parser = Parser::new(tokens.into_iter());
    let expr = parser.parse_expr()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let pos = lhs.pos;
    Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), pos)
}

impl<I: Iterator<Item = Token>> Parser<I> {
    /// expr = assign-expr
    pub fn parse_expr(&mut self) -> Result<Expr, Located> {
        self.parse_assign_expr()
    }

    /// assign-expr = cond-expr [ "=" assign-expr ]
    fn parse_assign_expr(&mut self) -> Result<Expr, Located> {
        let lhs = self.parse_cond_expr()?;
        if check!(self, Equal) {
            expect!(self, Equal)?;
            let rhs = self.parse_assign_expr()?;
            let pos = lhs.pos;
            return Ok(Expr::new(
                ExprKind::Assign(Box::new(lhs), Box::new(rhs)),
                pos,
            ));
        }
        Ok(lhs)
    }

    /// cond-expr = lor-expr [ "?" expr ":" cond-expr ]
    fn parse_cond_expr(&mut self) -> Result<Expr, Located> {
        let cond = self.parse_lor_expr()?;
        if check!(self, Question) {
            expect!(self, Question)?;
            let then = self.parse_expr()?;
            expect!(self, Colon)?;
            let other = self.parse_cond_expr()?;
            let pos = cond.pos;
            return Ok(Expr::new(
                ExprKind::Cond(Box::new(cond), Box::new(then), Box::new(other)),
                pos,
            ));
        }
        Ok(cond)
    }

    /// lor-expr = land-expr { "||" land-expr }
    fn parse_lor_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_land_expr()?;
        while check!(self, PipePipe) {
            expect!(self, PipePipe)?;
            let rhs = self.parse_land_expr()?;
            lhs = binary(BinaryOp::LogOr, lhs, rhs);
        }
        Ok(lhs)
    }

    /// land-expr = or-expr { "&&" or-expr }
    fn parse_land_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_or_expr()?;
        while check!(self, AmpAmp) {
            expect!(self, AmpAmp)?;
            let rhs = self.parse_or_expr()?;
            lhs = binary(BinaryOp::LogAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    /// or-expr = xor-expr { "|" xor-expr }
    fn parse_or_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_xor_expr()?;
        while check!(self, Pipe) {
            expect!(self, Pipe)?;
            let rhs = self.parse_xor_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    /// xor-expr = and-expr { "^" and-expr }
    fn parse_xor_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_and_expr()?;
        while check!(self, Caret) {
            expect!(self, Caret)?;
            let rhs = self.parse_and_expr()?;
            lhs = binary(BinaryOp::Xor, lhs, rhs);
        }
        Ok(lhs)
    }

    /// and-expr = eq-expr { "&" eq-expr }
    fn parse_and_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_eq_expr()?;
        while check!(self, Ampasand) {
            expect!(self, Ampasand)?;
            let rhs = self.parse_eq_expr()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    /// eq-expr = relat-expr { ( "==" | "!=" ) relat-expr }
    fn parse_eq_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_relat_expr()?;
        loop {
            let op = if check!(self, EqualEqual) {
                BinaryOp::Eq
            } else if check!(self, ExclEqual) {
                BinaryOp::Ne
            } else {
                break;
            };
            self.next();
            let rhs = self.parse_relat_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// relat-expr = shift-expr [ ( "<" | "<=" | ">" | ">=" ) shift-expr ]
    fn parse_relat_expr(&mut self) -> Result<Expr, Located> {
        let lhs = self.parse_shift_expr()?;
        let op = match self.peek().map(|t| &t.kind) {
            Some(LAngle) => BinaryOp::Lt,
            Some(LAngleEqual) => BinaryOp::Le,
            Some(RAngle) => BinaryOp::Gt,
            Some(RAngleEqual) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.parse_shift_expr()?;
        Ok(binary(op, lhs, rhs))
    }

    /// shift-expr = add-expr { ( "<<" | ">>" ) add-expr }
    fn parse_shift_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_add_expr()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(LAngleLAngle) => BinaryOp::Shl,
                Some(RAngleRAngle) => BinaryOp::Shr,
                _ => break,
            };
            self.next();
            let rhs = self.parse_add_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// add-expr = mul-expr { ( "+" | "-" | "#" ) mul-expr }
    fn parse_add_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_mul_expr()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(Plus) => BinaryOp::Add,
                Some(Minus) => BinaryOp::Sub,
                Some(Hash) => BinaryOp::Concat,
                _ => break,
            };
            self.next();
            let rhs = self.parse_mul_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// mul-expr = unary-expr { ( "*" | "/" | "%" ) unary-expr }
    fn parse_mul_expr(&mut self) -> Result<Expr, Located> {
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(Star) => BinaryOp::Mul,
                Some(Slash) => BinaryOp::Div,
                Some(Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.next();
            let rhs = self.parse_unary_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// unary-expr = ( "-" | "!" | "+" ) unary-expr | primary-expr
    fn parse_unary_expr(&mut self) -> Result<Expr, Located> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };
        let pos = token.pos;
        let op = match token.kind {
            Minus => UnaryOp::Neg,
            Excl => UnaryOp::Not,
            Plus => {
                self.next();
                return self.parse_unary_expr();
            }
            _ => return self.parse_primary_expr(),
        };
        self.next();
        let operand = self.parse_unary_expr()?;
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), pos))
    }

    /// primary-expr = integer | real | text | "true" | "false"
    ///              | ident [ "(" [ expr { "," expr } ] ")" ] | "(" expr ")"
    fn parse_primary_expr(&mut self) -> Result<Expr, Located> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };
        let pos = token.pos;
        let kind = match token.kind {
            Integer(_, n) => {
                self.next();
                ExprKind::Literal(Value::Int(n))
            }
            Real(_, r) => {
                self.next();
                ExprKind::Literal(Value::Real(r))
            }
            Text(s) => {
                self.next();
                ExprKind::Literal(Value::Str(s))
            }
            KwTrue => {
                self.next();
                ExprKind::Literal(Value::Bool(true))
            }
            KwFalse => {
                self.next();
                ExprKind::Literal(Value::Bool(false))
            }
            Ident(name) => {
                self.next();
                if check!(self, LParen) {
                    expect!(self, LParen)?;
                    let args = repeat!(self, self.parse_expr(), Comma, RParen);
                    expect!(self, RParen)?;
                    ExprKind::Call(name, args)
                } else {
                    ExprKind::Variable(name)
                }
            }
            LParen => {
                expect!(self, LParen)?;
                let expr = self.parse_expr()?;
                expect!(self, RParen)?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, pos))
    }
}

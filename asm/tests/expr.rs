use cfasm::expr::token::Pos;
use cfasm::expr::{eval_const, Value, Value::*};

fn assert(text: &str, expect: Value) {
    let value = eval_const(text, Pos::new(1, 1));
    println!(" {text}\n  = {value:?}");
    assert_eq!(value.map_err(|e| e.error.to_string()), Ok(expect));
}

macro_rules! case {
    ($name:ident, $text:expr, $expect:expr) => {
        #[test]
        fn $name() {
            assert($text, $expect);
        }
    };
}

case!(precedence, "(2+1)*4-2", Int(10));
case!(unary, "-3 * -(1 + 1)", Int(6));
case!(radix, "0x1F + 0b101 + 017", Int(51));
case!(shifts, "1 << 10 >> 3", Int(128));
case!(bitwise, "0xF0 & 0x3C ^ 0x01", Int(0x31));
case!(remainder, "17 % 5", Int(2));
case!(integer_division, "-7 / 2", Int(-3));
case!(mixed_real, "3 / 2.0", Real(1.5));
case!(wrapping, "9223372036854775807 + 1", Int(i64::MIN));
case!(comparison, "2 * 3 >= 6", Bool(true));
case!(logic, "1 < 2 || 1 / 0 == 0", Bool(true));
case!(ternary, "4 > 5 ? 1 : 2", Int(2));
case!(concat, "\"x\" # 1 + 2", Str("x12".into()));
case!(conversion, "int(\"12\") + len(\"abc\")", Int(15));
case!(formatting, "str(0.25)", Str("0.25".into()));

#[test]
fn errors_carry_positions() {
    let err = eval_const("1 + (2 * 10 / 0)", Pos::new(4, 9)).unwrap_err();
    assert_eq!(err.pos.line, 4);
    assert!(err.error.to_string().contains("10 / 0"), "{}", err.error);

    let err = eval_const("1 +", Pos::new(2, 1)).unwrap_err();
    assert_eq!(err.pos.line, 2);

    assert!(eval_const("undefined + 1", Pos::new(1, 1)).is_err());
}

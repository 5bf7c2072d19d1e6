use crate::expr::token::Pos;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Resolution,
    Evaluation,
    ResourceLimit,
    Io,
}

#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------------
    // Syntax
    #[error("Unexpected end of input")]
    UnexpectedEOF,

    #[error("Unexpected token: `{0}`")]
    UnexpectedToken(String),

    #[error("Invalid literal: `{0}`")]
    InvalidLiteral(String),

    #[error("Unknown instruction: `{0}`")]
    UnknownInstruction(String),

    #[error("Unknown directive: `{0}`")]
    UnknownDirective(String),

    #[error("Restricted instruction: `{0}`")]
    RestrictedInstruction(String),

    #[error("Missing operand: {0}")]
    MissingOperand(String),

    #[error("Unexpected operand: `{0}`")]
    ExtraOperand(String),

    #[error("`{0}` is not allowed here")]
    Misplaced(String),

    #[error("Mismatched `.end`: expected `{0}`, found `{1}`")]
    MismatchedEnd(String, String),

    #[error("Invalid modifiers: {0}")]
    InvalidModifier(String),

    #[error("Duplicate macro definition: `{0}`")]
    DuplicateMacroDefinition(String),

    #[error("Unclosed macro definition: `{0}`")]
    UnclosedMacro(String),

    #[error("Duplicate parameter: `{0}`")]
    DuplicateParameter(String),

    #[error("Required parameter `{0}` follows a parameter with a default value")]
    RequiredAfterDefault(String),

    #[error("Duplicate variable: `{0}`")]
    DuplicateVariable(String),

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("`{0}` outside of a loop")]
    OutsideLoop(String),

    #[error("Unreachable statement")]
    UnreachableStatement,

    #[error("`.stack` must precede the first instruction of `{0}`")]
    MissingStack(String),

    #[error("Method `{0}` has no code")]
    MissingCode(String),

    #[error("Method `{0}` cannot have code")]
    UnexpectedCode(String),

    #[error("Empty try block")]
    EmptyTry,

    #[error("Missing `.default` in switch")]
    MissingDefault,

    #[error("Duplicate switch key: {0}")]
    DuplicateSwitchKey(i32),

    #[error("Initial value is only allowed on static final fields: `{0}`")]
    InvalidInitializer(String),

    #[error("Unclosed `{0}`")]
    Unclosed(String),

    #[error("Malformed module: {0}")]
    MalformedModule(String),

    // ------------------------------------------------------------------------
    // Resolution
    #[error("Unbound symbol: `{0}`")]
    UnboundSymbol(String),

    #[error("Duplicate label: `{0}`")]
    DuplicateLabel(String),

    #[error("Unresolved symbol: `{0}` (first referenced at line {1})")]
    UnresolvedSymbol(String, usize),

    #[error("Unknown class: `{0}`")]
    UnknownClass(String),

    #[error("Unknown field: `{0}`")]
    UnknownField(String),

    #[error("Unknown method: `{0}`")]
    UnknownMethod(String),

    #[error("Invalid type: `{0}`")]
    InvalidType(String),

    #[error("Duplicate member: `{0}`")]
    DuplicateMember(String),

    #[error("Local variable {0} out of range")]
    LocalOutOfRange(String),

    #[error("Value {0} out of range for {1}")]
    ValueOutOfRange(String, String),

    #[error("Branch to `{0}` out of range")]
    BranchOutOfRange(String),

    // ------------------------------------------------------------------------
    // Evaluation
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Arithmetic error: {0}")]
    ArithmeticError(String),

    #[error("Unknown function: `{0}`")]
    UnknownFunction(String),

    #[error("Argument count mismatch for `{0}`: {1}")]
    ArgumentCountMismatch(String, String),

    #[error("Argument type mismatch for parameter `{0}`: expected {1}, found `{2}`")]
    ArgumentTypeMismatch(String, String, String),

    #[error("Macro `{0}` has errors and cannot be expanded")]
    InvalidMacro(String),

    #[error("{0}")]
    MacroError(String),

    // ------------------------------------------------------------------------
    // Resource limits
    #[error("Macro expansion limit exceeded: more than {0} loop iterations")]
    MacroExpansionLimitExceeded(usize),

    #[error("Macro recursion limit exceeded: nesting deeper than {0}")]
    MacroRecursionLimitExceeded(usize),

    #[error("Constant pool overflow")]
    ConstantPoolOverflow,

    #[error("Utf8 constant of {0} bytes exceeds 65535")]
    ConstantTooLong(usize),

    #[error("Code of `{0}` is too large")]
    CodeTooLarge(String),

    // ------------------------------------------------------------------------
    // IO
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to read line")]
    FileRead(#[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),

    #[error("Failed to load `{0}`: {1}")]
    Yaml(String, #[source] serde_yaml::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            UnexpectedEOF
            | UnexpectedToken(_)
            | InvalidLiteral(_)
            | UnknownInstruction(_)
            | UnknownDirective(_)
            | RestrictedInstruction(_)
            | MissingOperand(_)
            | ExtraOperand(_)
            | Misplaced(_)
            | MismatchedEnd(_, _)
            | InvalidModifier(_)
            | DuplicateMacroDefinition(_)
            | UnclosedMacro(_)
            | DuplicateParameter(_)
            | RequiredAfterDefault(_)
            | DuplicateVariable(_)
            | InvalidAssignmentTarget
            | OutsideLoop(_)
            | UnreachableStatement
            | MissingStack(_)
            | MissingCode(_)
            | UnexpectedCode(_)
            | EmptyTry
            | MissingDefault
            | DuplicateSwitchKey(_)
            | InvalidInitializer(_)
            | Unclosed(_)
            | MalformedModule(_) => ErrorKind::Syntax,

            UnboundSymbol(_)
            | DuplicateLabel(_)
            | UnresolvedSymbol(_, _)
            | UnknownClass(_)
            | UnknownField(_)
            | UnknownMethod(_)
            | InvalidType(_)
            | DuplicateMember(_)
            | LocalOutOfRange(_)
            | ValueOutOfRange(_, _)
            | BranchOutOfRange(_) => ErrorKind::Resolution,

            TypeMismatch { .. }
            | ArithmeticError(_)
            | UnknownFunction(_)
            | ArgumentCountMismatch(_, _)
            | ArgumentTypeMismatch(_, _, _)
            | InvalidMacro(_)
            | MacroError(_) => ErrorKind::Evaluation,

            MacroExpansionLimitExceeded(_)
            | MacroRecursionLimitExceeded(_)
            | ConstantPoolOverflow
            | ConstantTooLong(_)
            | CodeTooLarge(_) => ErrorKind::ResourceLimit,

            FileOpen(_, _) | FileRead(_) | FileCreate(_, _) | FileWrite(_, _) | Yaml(_, _) => {
                ErrorKind::Io
            }
        }
    }

    pub fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn at(self, pos: Pos) -> Located {
        Located { error: self, pos }
    }
}

/// Error carrying the source position it was raised at.
#[derive(Debug)]
pub struct Located {
    pub error: Error,
    pub pos: Pos,
}

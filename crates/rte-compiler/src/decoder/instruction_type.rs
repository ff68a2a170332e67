//! Rating-engine instruction type vocabulary
//!
//! The numeric `t` attribute of an instruction names the engine operation
//! that produced its text. The decoder grammar is the same for every type;
//! the type only decides whether blank text is acceptable and is carried on
//! the model for downstream tools.

use std::borrow::Cow;

use serde::Serialize;

macro_rules! instruction_types {
    ($($variant:ident = $code:literal => $label:literal),* $(,)?) => {
        /// Rating-engine instruction type, from the numeric `t` attribute.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum InstructionType {
            $($variant,)*
            Unknown(i32),
        }

        impl InstructionType {
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => InstructionType::$variant,)*
                    other => InstructionType::Unknown(other),
                }
            }

            pub fn code(self) -> i32 {
                match self {
                    $(InstructionType::$variant => $code,)*
                    InstructionType::Unknown(code) => code,
                }
            }

            /// Step-type label shown ahead of a rendered description.
            pub fn label(self) -> Cow<'static, str> {
                match self {
                    $(InstructionType::$variant => Cow::Borrowed($label),)*
                    InstructionType::Unknown(code) => Cow::Owned(format!("Type {}", code)),
                }
            }
        }
    };
}

instruction_types! {
    Arithmetic = 0 => "Arithmetic",
    NumericIf = 1 => "Numeric If",
    Call = 2 => "Call Algorithm",
    Sort = 3 => "Sort",
    Mask = 4 => "Mask",
    SetString = 5 => "Set String",
    Empty = 6 => "Empty Step",
    IfAllAll = 50 => "If All (All Paths)",
    IfNoAll = 51 => "If None (All Paths)",
    IfAnyAll = 52 => "If Any (All Paths)",
    IfAllCurrentPath = 53 => "If All (Current Path)",
    IfNoCurrentPath = 54 => "If None (Current Path)",
    IfAnyCurrentPath = 55 => "If Any (Current Path)",
    IfDate = 56 => "If Date",
    DateDiffDays = 57 => "Date Diff Days",
    DateDiffMonths = 58 => "Date Diff Months",
    DateDiffYears = 59 => "Date Diff Years",
    Sum = 60 => "Sum",
    Abs = 84 => "Absolute Value",
    StringLength = 85 => "String Length",
    StringConcat = 86 => "String Concat",
    SumCurrentPath = 87 => "Sum (Current Path)",
    CountCategoryAvailable = 89 => "Count Category Available",
    CountCategoryInstance = 90 => "Count Category Instance",
    RankCategoryAvailable = 93 => "Rank Category Available",
    RankCategoryInstance = 94 => "Rank Category Instance",
    IsDate = 95 => "Is Date",
    IsNumeric = 98 => "Is Numeric",
    IsAlpha = 99 => "Is Alpha",
    AssociateHrvValue = 110 => "Associate HRV Value",
    FlagAllByUsageSet = 113 => "Flag All by Usage Set",
    RankAllByUsageSetAsc = 118 => "Rank All by Usage Set (Ascending)",
    RankAllByUsageSetDesc = 119 => "Rank All by Usage Set (Descending)",
    GetCategoryItem = 120 => "Get Category Item",
    SetCategoryItem = 121 => "Set Category Item",
    GetRankedCategoryItem = 122 => "Get Ranked Category Item",
    SetRankedCategoryItem = 123 => "Set Ranked Category Item",
    GetCategoryItemAvailable = 124 => "Get Category Item Available",
    SetCategoryItemAvailable = 125 => "Set Category Item Available",
    DateAddition = 126 => "Date Addition",
    MathExp = 127 => "Math Exp",
    MathLog = 128 => "Math Log",
    MathLog10 = 129 => "Math Log10",
    MathExpE = 130 => "Math Exp E",
    MathRand = 131 => "Math Rand",
    MathFactorial = 132 => "Math Factorial",
    MathSqrt = 133 => "Math Sqrt",
    MathCeil = 134 => "Math Ceil",
    MathFloor = 135 => "Math Floor",
    MathEven = 136 => "Math Even",
    MathOdd = 137 => "Math Odd",
    TrigCos = 138 => "Trig Cos",
    TrigCosh = 139 => "Trig Cosh",
    TrigAcos = 140 => "Trig Acos",
    TrigAcosh = 141 => "Trig Acosh",
    TrigSin = 142 => "Trig Sin",
    TrigSinh = 143 => "Trig Sinh",
    TrigAsin = 144 => "Trig Asin",
    TrigAsinh = 145 => "Trig Asinh",
    TrigTan = 146 => "Trig Tan",
    TrigTanh = 147 => "Trig Tanh",
    TrigAtan = 148 => "Trig Atan",
    TrigAtanh = 149 => "Trig Atanh",
    TrigDegrees = 150 => "Trig Degrees",
    TrigRadians = 151 => "Trig Radians",
    QueryDataSource = 200 => "Query Data Source",
    SetUnderwritingToFail = 254 => "Set Underwriting to Fail",
}

impl InstructionType {
    /// Types whose instruction text may legitimately be blank.
    pub fn allows_empty_text(self) -> bool {
        matches!(
            self,
            InstructionType::Empty | InstructionType::SetUnderwritingToFail
        )
    }

    pub fn is_known(self) -> bool {
        !matches!(self, InstructionType::Unknown(_))
    }
}

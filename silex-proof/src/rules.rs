//! Rule catalogues: rewrite rules, tautology schemas and split rules.
//!
//! The names are the annotation keys that appear in printed proofs; the
//! checker dispatches on the enum, never on strings.

/// The rewrite axiom catalogue of the proof-tracked compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum RewriteRule {
    Expand,
    ExpandDef,
    TrueNotFalse,
    ConstDiff,
    EqTrue,
    EqFalse,
    EqSimp,
    EqSame,
    EqBinary,
    DistinctBool,
    DistinctSame,
    DistinctNeg,
    DistinctTrue,
    DistinctFalse,
    DistinctBoolEq,
    DistinctBinary,
    NotSimp,
    OrSimp,
    OrTaut,
    IteTrue,
    IteFalse,
    IteSame,
    IteBool1,
    IteBool2,
    IteBool3,
    IteBool4,
    IteBool5,
    IteBool6,
    AndToOr,
    XorToDistinct,
    ImpToOr,
    Strip,
    CanonicalSum,
    LeqToLeq0,
    LtToLeq0,
    GeqToLeq0,
    GtToLeq0,
    LeqTrue,
    LeqFalse,
    Desugar,
    Divisible,
    DivOne,
    DivMinusOne,
    DivConst,
    ModuloOne,
    ModuloMinusOne,
    ModuloConst,
    Modulo,
    ToInt,
    ToReal,
    StoreOverStore,
    SelectOverStore,
    Flatten,
    StoreRewrite,
}

impl RewriteRule {
    /// The printed annotation key.
    pub fn key(self) -> &'static str {
        match self {
            RewriteRule::Expand => ":expand",
            RewriteRule::ExpandDef => ":expandDef",
            RewriteRule::TrueNotFalse => ":trueNotFalse",
            RewriteRule::ConstDiff => ":constDiff",
            RewriteRule::EqTrue => ":eqTrue",
            RewriteRule::EqFalse => ":eqFalse",
            RewriteRule::EqSimp => ":eqSimp",
            RewriteRule::EqSame => ":eqSame",
            RewriteRule::EqBinary => ":eqBinary",
            RewriteRule::DistinctBool => ":distinctBool",
            RewriteRule::DistinctSame => ":distinctSame",
            RewriteRule::DistinctNeg => ":distinctNeg",
            RewriteRule::DistinctTrue => ":distinctTrue",
            RewriteRule::DistinctFalse => ":distinctFalse",
            RewriteRule::DistinctBoolEq => ":distinctBoolEq",
            RewriteRule::DistinctBinary => ":distinctBinary",
            RewriteRule::NotSimp => ":notSimp",
            RewriteRule::OrSimp => ":orSimp",
            RewriteRule::OrTaut => ":orTaut",
            RewriteRule::IteTrue => ":iteTrue",
            RewriteRule::IteFalse => ":iteFalse",
            RewriteRule::IteSame => ":iteSame",
            RewriteRule::IteBool1 => ":iteBool1",
            RewriteRule::IteBool2 => ":iteBool2",
            RewriteRule::IteBool3 => ":iteBool3",
            RewriteRule::IteBool4 => ":iteBool4",
            RewriteRule::IteBool5 => ":iteBool5",
            RewriteRule::IteBool6 => ":iteBool6",
            RewriteRule::AndToOr => ":andToOr",
            RewriteRule::XorToDistinct => ":xorToDistinct",
            RewriteRule::ImpToOr => ":impToOr",
            RewriteRule::Strip => ":strip",
            RewriteRule::CanonicalSum => ":canonicalSum",
            RewriteRule::LeqToLeq0 => ":leqToLeq0",
            RewriteRule::LtToLeq0 => ":ltToLeq0",
            RewriteRule::GeqToLeq0 => ":geqToLeq0",
            RewriteRule::GtToLeq0 => ":gtToLeq0",
            RewriteRule::LeqTrue => ":leqTrue",
            RewriteRule::LeqFalse => ":leqFalse",
            RewriteRule::Desugar => ":desugar",
            RewriteRule::Divisible => ":divisible",
            RewriteRule::DivOne => ":divOne",
            RewriteRule::DivMinusOne => ":divMinusOne",
            RewriteRule::DivConst => ":divConst",
            RewriteRule::ModuloOne => ":moduloOne",
            RewriteRule::ModuloMinusOne => ":moduloMinusOne",
            RewriteRule::ModuloConst => ":moduloConst",
            RewriteRule::Modulo => ":modulo",
            RewriteRule::ToInt => ":toInt",
            RewriteRule::ToReal => ":toReal",
            RewriteRule::StoreOverStore => ":storeOverStore",
            RewriteRule::SelectOverStore => ":selectOverStore",
            RewriteRule::Flatten => ":flatten",
            RewriteRule::StoreRewrite => ":storeRewrite",
        }
    }
}

/// Tautology schemas (proxy literal definitions and theory axioms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TautRule {
    TrueNotFalse,
    OrPos,
    OrNeg,
    ItePos1,
    ItePos2,
    ItePosRed,
    IteNeg1,
    IteNeg2,
    IteNegRed,
    EqPos1,
    EqPos2,
    EqNeg1,
    EqNeg2,
    TermIte,
    ExcludedMiddle1,
    ExcludedMiddle2,
    DivHigh,
    DivLow,
    ToIntHigh,
    ToIntLow,
    Store,
    Diff,
}

impl TautRule {
    /// The printed annotation key.
    pub fn key(self) -> &'static str {
        match self {
            TautRule::TrueNotFalse => ":trueNotFalse",
            TautRule::OrPos => ":or+",
            TautRule::OrNeg => ":or-",
            TautRule::ItePos1 => ":ite+1",
            TautRule::ItePos2 => ":ite+2",
            TautRule::ItePosRed => ":ite+red",
            TautRule::IteNeg1 => ":ite-1",
            TautRule::IteNeg2 => ":ite-2",
            TautRule::IteNegRed => ":ite-red",
            TautRule::EqPos1 => ":=+1",
            TautRule::EqPos2 => ":=+2",
            TautRule::EqNeg1 => ":=-1",
            TautRule::EqNeg2 => ":=-2",
            TautRule::TermIte => ":termITE",
            TautRule::ExcludedMiddle1 => ":excludedMiddle1",
            TautRule::ExcludedMiddle2 => ":excludedMiddle2",
            TautRule::DivHigh => ":divHigh",
            TautRule::DivLow => ":divLow",
            TautRule::ToIntHigh => ":toIntHigh",
            TautRule::ToIntLow => ":toIntLow",
            TautRule::Store => ":store",
            TautRule::Diff => ":diff",
        }
    }
}

/// Split rules (extracting a piece of an already proved formula).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SplitRule {
    NotOr,
    EqPos1,
    EqPos2,
    EqNeg1,
    EqNeg2,
    ItePos1,
    ItePos2,
    IteNeg1,
    IteNeg2,
}

impl SplitRule {
    /// The printed annotation key.
    pub fn key(self) -> &'static str {
        match self {
            SplitRule::NotOr => ":notOr",
            SplitRule::EqPos1 => ":=+1",
            SplitRule::EqPos2 => ":=+2",
            SplitRule::EqNeg1 => ":=-1",
            SplitRule::EqNeg2 => ":=-2",
            SplitRule::ItePos1 => ":ite+1",
            SplitRule::ItePos2 => ":ite+2",
            SplitRule::IteNeg1 => ":ite-1",
            SplitRule::IteNeg2 => ":ite-2",
        }
    }
}

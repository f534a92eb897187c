//! Mana costs, pools and payment
//!
//! Costs are parsed from `{..}` symbol strings into a structured record.
//! Payment debits a pool in a fixed order: colored symbols, hybrid choices,
//! two-brid choices, Phyrexian choices, colorless, then generic.

use crate::core::types::Subtype;
use crate::{Result, RulesError};
use nom::{
    branch::alt,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, value},
    multi::many0,
    sequence::{delimited, pair, separated_pair, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five colors of Magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(alias = "white", alias = "W")]
    White,
    #[serde(alias = "blue", alias = "U")]
    Blue,
    #[serde(alias = "black", alias = "B")]
    Black,
    #[serde(alias = "red", alias = "R")]
    Red,
    #[serde(alias = "green", alias = "G")]
    Green,
}

impl Color {
    pub const ALL: [Color; 5] = [Color::White, Color::Blue, Color::Black, Color::Red, Color::Green];

    pub fn from_symbol(symbol: char) -> Option<Color> {
        match symbol.to_ascii_uppercase() {
            'W' => Some(Color::White),
            'U' => Some(Color::Blue),
            'B' => Some(Color::Black),
            'R' => Some(Color::Red),
            'G' => Some(Color::Green),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Color> {
        match name.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Some(Color::White),
            "blue" | "u" => Some(Color::Blue),
            "black" | "b" => Some(Color::Black),
            "red" | "r" => Some(Color::Red),
            "green" | "g" => Some(Color::Green),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Color::White => "W",
            Color::Blue => "U",
            Color::Black => "B",
            Color::Red => "R",
            Color::Green => "G",
        };
        write!(f, "{symbol}")
    }
}

/// Set of colors stored as a bitmask. The empty set is colorless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorSet(u8);

impl ColorSet {
    pub const fn empty() -> Self {
        ColorSet(0)
    }

    pub fn single(color: Color) -> Self {
        ColorSet(color.bit())
    }

    pub fn insert(&mut self, color: Color) {
        self.0 |= color.bit();
    }

    pub fn contains(&self, color: Color) -> bool {
        self.0 & color.bit() != 0
    }

    pub fn union(self, other: ColorSet) -> ColorSet {
        ColorSet(self.0 | other.0)
    }

    pub fn intersects(&self, other: ColorSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Color> + '_ {
        Color::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Color> for ColorSet {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        let mut set = ColorSet::empty();
        for color in iter {
            set.insert(color);
        }
        set
    }
}

/// A kind of mana that can sit in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManaType {
    Color(Color),
    Colorless,
    /// Mana of a color chosen later. Only spendable on generic costs.
    Any,
}

impl fmt::Display for ManaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManaType::Color(c) => write!(f, "{c}"),
            ManaType::Colorless => write!(f, "C"),
            ManaType::Any => write!(f, "*"),
        }
    }
}

/// One parsed cost symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManaSymbol {
    Generic(u32),
    Colored(Color),
    Colorless,
    Snow,
    X,
    Hybrid(Color, Color),
    TwoBrid(u32, Color),
    Phyrexian(Color),
}

fn color_symbol(input: &str) -> IResult<&str, Color> {
    map_res(one_of("WUBRGwubrg"), |c| {
        Color::from_symbol(c).ok_or("not a color")
    })(input)
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn symbol_body(input: &str) -> IResult<&str, ManaSymbol> {
    alt((
        map(terminated(color_symbol, pair(char('/'), one_of("Pp"))), ManaSymbol::Phyrexian),
        map(separated_pair(color_symbol, char('/'), color_symbol), |(a, b)| {
            ManaSymbol::Hybrid(a, b)
        }),
        map(separated_pair(number, char('/'), color_symbol), |(n, c)| {
            ManaSymbol::TwoBrid(n, c)
        }),
        map(number, ManaSymbol::Generic),
        value(ManaSymbol::X, one_of("Xx")),
        value(ManaSymbol::Colorless, one_of("Cc")),
        value(ManaSymbol::Snow, one_of("Ss")),
        map(color_symbol, ManaSymbol::Colored),
    ))(input)
}

fn mana_symbol(input: &str) -> IResult<&str, ManaSymbol> {
    delimited(char('{'), symbol_body, char('}'))(input)
}

fn mana_symbols(input: &str) -> IResult<&str, Vec<ManaSymbol>> {
    all_consuming(many0(mana_symbol))(input)
}

/// A structured mana cost
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaCost {
    /// Generic amount, including the value of any X symbols
    pub generic: u32,
    /// Colored requirements indexed W, U, B, R, G
    pub colored: [u32; 5],
    pub colorless: u32,
    pub hybrids: Vec<(Color, Color)>,
    pub two_brids: Vec<(u32, Color)>,
    pub phyrexian: Vec<Color>,
    pub x_count: u32,
    pub x_value: u32,
}

impl ManaCost {
    /// Parse a cost like `{2}{W}{W}`, `{X}{R}`, `{W/U}` or `{G/P}`.
    ///
    /// An empty string is the zero cost. Snow symbols are treated as
    /// colorless requirements.
    pub fn parse(text: &str, x_value: u32) -> Result<ManaCost> {
        let trimmed = text.trim();
        let (_, symbols) = mana_symbols(trimmed)
            .map_err(|e| RulesError::Parse(format!("bad mana cost '{trimmed}': {e}")))?;

        let mut cost = ManaCost {
            x_value,
            ..ManaCost::default()
        };
        for symbol in symbols {
            match symbol {
                ManaSymbol::Generic(n) => cost.generic += n,
                ManaSymbol::Colored(c) => cost.colored[c.index()] += 1,
                ManaSymbol::Colorless | ManaSymbol::Snow => cost.colorless += 1,
                ManaSymbol::X => {
                    cost.x_count += 1;
                    cost.generic += x_value;
                }
                ManaSymbol::Hybrid(a, b) => cost.hybrids.push((a, b)),
                ManaSymbol::TwoBrid(n, c) => cost.two_brids.push((n, c)),
                ManaSymbol::Phyrexian(c) => cost.phyrexian.push(c),
            }
        }
        Ok(cost)
    }

    pub fn colored_of(&self, color: Color) -> u32 {
        self.colored[color.index()]
    }

    pub fn add_generic(&mut self, amount: u32) {
        self.generic += amount;
    }

    /// Mana value, counting X at its chosen value
    pub fn mana_value(&self) -> u32 {
        let two_brid: u32 = self.two_brids.iter().map(|(n, _)| *n).sum();
        self.generic
            + self.colored.iter().sum::<u32>()
            + self.colorless
            + self.hybrids.len() as u32
            + two_brid
            + self.phyrexian.len() as u32
    }

    /// Colors named by the cost's symbols
    pub fn colors(&self) -> ColorSet {
        let mut set: ColorSet = Color::ALL
            .into_iter()
            .filter(|c| self.colored_of(*c) > 0)
            .collect();
        for (a, b) in &self.hybrids {
            set.insert(*a);
            set.insert(*b);
        }
        for (_, c) in &self.two_brids {
            set.insert(*c);
        }
        for c in &self.phyrexian {
            set.insert(*c);
        }
        set
    }

    pub fn needs_choices(&self) -> bool {
        !self.hybrids.is_empty() || !self.two_brids.is_empty() || !self.phyrexian.is_empty()
    }

    pub fn is_free(&self) -> bool {
        self.mana_value() == 0
    }
}

impl fmt::Display for ManaCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.generic.saturating_sub(self.x_value * self.x_count);
        for _ in 0..self.x_count {
            write!(f, "{{X}}")?;
        }
        if base > 0 {
            write!(f, "{{{base}}}")?;
        }
        for (a, b) in &self.hybrids {
            write!(f, "{{{a}/{b}}}")?;
        }
        for (n, c) in &self.two_brids {
            write!(f, "{{{n}/{c}}}")?;
        }
        for c in &self.phyrexian {
            write!(f, "{{{c}/P}}")?;
        }
        for color in Color::ALL {
            for _ in 0..self.colored_of(color) {
                write!(f, "{{{color}}}")?;
            }
        }
        for _ in 0..self.colorless {
            write!(f, "{{C}}")?;
        }
        Ok(())
    }
}

/// A player's floating mana
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaPool {
    pub colored: [u32; 5],
    pub colorless: u32,
    pub any: u32,
}

impl ManaPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mana: ManaType, amount: u32) {
        match mana {
            ManaType::Color(c) => self.colored[c.index()] += amount,
            ManaType::Colorless => self.colorless += amount,
            ManaType::Any => self.any += amount,
        }
    }

    pub fn amount(&self, mana: ManaType) -> u32 {
        match mana {
            ManaType::Color(c) => self.colored[c.index()],
            ManaType::Colorless => self.colorless,
            ManaType::Any => self.any,
        }
    }

    /// Remove up to `amount` of one mana type, returning how much was taken
    fn take_up_to(&mut self, mana: ManaType, amount: u32) -> u32 {
        let slot = match mana {
            ManaType::Color(c) => &mut self.colored[c.index()],
            ManaType::Colorless => &mut self.colorless,
            ManaType::Any => &mut self.any,
        };
        let taken = (*slot).min(amount);
        *slot -= taken;
        taken
    }

    fn take_exact(&mut self, mana: ManaType, amount: u32, what: &str) -> Result<()> {
        if self.amount(mana) < amount {
            return Err(RulesError::InsufficientMana(format!(
                "need {amount} {mana} for {what}, have {}",
                self.amount(mana)
            )));
        }
        self.take_up_to(mana, amount);
        Ok(())
    }

    pub fn total(&self) -> u32 {
        self.colored.iter().sum::<u32>() + self.colorless + self.any
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn clear(&mut self) {
        *self = ManaPool::default();
    }

    /// Whether some combination of payment choices pays `cost` from this
    /// pool, with unlimited life for Phyrexian symbols
    pub fn can_pay(&self, cost: &ManaCost) -> bool {
        find_payment(self, cost, None).is_some()
    }
}

impl fmt::Display for ManaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for color in Color::ALL {
            for _ in 0..self.colored[color.index()] {
                write!(f, "{color}")?;
            }
        }
        for _ in 0..self.colorless {
            write!(f, "C")?;
        }
        for _ in 0..self.any {
            write!(f, "*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoBridChoice {
    /// Pay one mana of the symbol's color
    Color,
    /// Pay the symbol's generic amount
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhyrexianChoice {
    Mana,
    /// Pay 2 life instead
    Life,
}

/// Choices for the non-deterministic symbols of a cost, in symbol order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManaPayment {
    pub hybrid: Vec<Color>,
    pub two_brid: Vec<TwoBridChoice>,
    pub phyrexian: Vec<PhyrexianChoice>,
    /// Preferred order for spending mana on the generic part. Types not
    /// listed are spent afterwards in the default order.
    pub generic_order: Vec<ManaType>,
}

/// What a successful payment consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaymentReceipt {
    pub spent: ManaPool,
    pub life: u32,
}

const DEFAULT_GENERIC_ORDER: [ManaType; 7] = [
    ManaType::Colorless,
    ManaType::Color(Color::White),
    ManaType::Color(Color::Blue),
    ManaType::Color(Color::Black),
    ManaType::Color(Color::Red),
    ManaType::Color(Color::Green),
    ManaType::Any,
];

fn choice_count_error(kind: &str, expected: usize, got: usize) -> RulesError {
    RulesError::MissingChoice(format!("expected {expected} {kind} choice(s), got {got}"))
}

/// Debit `cost` from `pool` using `payment`'s choices.
///
/// The pool is left untouched on failure. Life owed for Phyrexian symbols
/// is reported in the receipt; the caller debits it.
pub fn pay(pool: &mut ManaPool, cost: &ManaCost, payment: &ManaPayment) -> Result<PaymentReceipt> {
    if payment.hybrid.len() != cost.hybrids.len() {
        return Err(choice_count_error("hybrid", cost.hybrids.len(), payment.hybrid.len()));
    }
    if payment.two_brid.len() != cost.two_brids.len() {
        return Err(choice_count_error("two-brid", cost.two_brids.len(), payment.two_brid.len()));
    }
    if payment.phyrexian.len() != cost.phyrexian.len() {
        return Err(choice_count_error(
            "Phyrexian",
            cost.phyrexian.len(),
            payment.phyrexian.len(),
        ));
    }

    let mut working = *pool;
    let mut life = 0;
    let mut generic = cost.generic;

    for color in Color::ALL {
        working.take_exact(ManaType::Color(color), cost.colored_of(color), "colored cost")?;
    }

    for ((a, b), chosen) in cost.hybrids.iter().zip(&payment.hybrid) {
        if chosen != a && chosen != b {
            return Err(RulesError::MissingChoice(format!(
                "{chosen} is not a half of {{{a}/{b}}}"
            )));
        }
        working.take_exact(ManaType::Color(*chosen), 1, "hybrid symbol")?;
    }

    for ((n, color), choice) in cost.two_brids.iter().zip(&payment.two_brid) {
        match choice {
            TwoBridChoice::Color => {
                working.take_exact(ManaType::Color(*color), 1, "two-brid symbol")?
            }
            TwoBridChoice::Generic => generic += n,
        }
    }

    for (color, choice) in cost.phyrexian.iter().zip(&payment.phyrexian) {
        match choice {
            PhyrexianChoice::Mana => {
                working.take_exact(ManaType::Color(*color), 1, "Phyrexian symbol")?
            }
            PhyrexianChoice::Life => life += 2,
        }
    }

    working.take_exact(ManaType::Colorless, cost.colorless, "colorless cost")?;

    let order = payment
        .generic_order
        .iter()
        .chain(DEFAULT_GENERIC_ORDER.iter());
    for mana in order {
        if generic == 0 {
            break;
        }
        generic -= working.take_up_to(*mana, generic);
    }
    if generic > 0 {
        return Err(RulesError::InsufficientMana(format!(
            "{generic} generic mana unpaid"
        )));
    }

    let mut spent = ManaPool::default();
    for color in Color::ALL {
        let c = ManaType::Color(color);
        spent.add(c, pool.amount(c) - working.amount(c));
    }
    spent.colorless = pool.colorless - working.colorless;
    spent.any = pool.any - working.any;

    *pool = working;
    Ok(PaymentReceipt { spent, life })
}

/// Search the payment choices for one that pays `cost` from `pool`.
///
/// `life_available` caps the life spendable on Phyrexian symbols; `None`
/// means unlimited. Choices are tried mana-first, so the result prefers
/// paying with mana over paying with life.
pub fn find_payment(pool: &ManaPool, cost: &ManaCost, life_available: Option<u32>) -> Option<ManaPayment> {
    let mut payment = ManaPayment::default();
    search_hybrid(pool, cost, life_available, &mut payment).then_some(payment)
}

fn search_hybrid(pool: &ManaPool, cost: &ManaCost, life: Option<u32>, payment: &mut ManaPayment) -> bool {
    let index = payment.hybrid.len();
    if index == cost.hybrids.len() {
        return search_two_brid(pool, cost, life, payment);
    }
    let (a, b) = cost.hybrids[index];
    for choice in [a, b] {
        payment.hybrid.push(choice);
        if search_hybrid(pool, cost, life, payment) {
            return true;
        }
        payment.hybrid.pop();
    }
    false
}

fn search_two_brid(pool: &ManaPool, cost: &ManaCost, life: Option<u32>, payment: &mut ManaPayment) -> bool {
    if payment.two_brid.len() == cost.two_brids.len() {
        return search_phyrexian(pool, cost, life, payment);
    }
    for choice in [TwoBridChoice::Color, TwoBridChoice::Generic] {
        payment.two_brid.push(choice);
        if search_two_brid(pool, cost, life, payment) {
            return true;
        }
        payment.two_brid.pop();
    }
    false
}

fn search_phyrexian(pool: &ManaPool, cost: &ManaCost, life: Option<u32>, payment: &mut ManaPayment) -> bool {
    if payment.phyrexian.len() == cost.phyrexian.len() {
        let mut trial = *pool;
        return match pay(&mut trial, cost, payment) {
            Ok(receipt) => life.map_or(true, |available| receipt.life <= available),
            Err(_) => false,
        };
    }
    for choice in [PhyrexianChoice::Mana, PhyrexianChoice::Life] {
        payment.phyrexian.push(choice);
        if search_phyrexian(pool, cost, life, payment) {
            return true;
        }
        payment.phyrexian.pop();
    }
    false
}

/// Mana produced by tapping a land with no compiled mana ability.
///
/// Basic land subtypes map to their color. Otherwise the oracle text is
/// scanned for an `Add {..}` clause or "mana of any color".
pub fn land_mana_production(subtypes: &[Subtype], oracle_text: &str) -> Option<ManaType> {
    for subtype in subtypes {
        let color = match subtype.as_str() {
            "Plains" => Color::White,
            "Island" => Color::Blue,
            "Swamp" => Color::Black,
            "Mountain" => Color::Red,
            "Forest" => Color::Green,
            _ => continue,
        };
        return Some(ManaType::Color(color));
    }

    let lower = oracle_text.to_ascii_lowercase();
    if lower.contains("mana of any color") {
        return Some(ManaType::Any);
    }
    let start = lower.find("add {")? + "add ".len();
    let (_, symbol) = mana_symbol(&oracle_text[start..]).ok()?;
    match symbol {
        ManaSymbol::Colored(c) => Some(ManaType::Color(c)),
        ManaSymbol::Colorless | ManaSymbol::Generic(_) => Some(ManaType::Colorless),
        _ => None,
    }
}

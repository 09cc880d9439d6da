//! Closed code tables: duty rate types, origin countries, incoterms, materials
//! and quota search classes.

use crate::utils::error::{Result, TariffError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 관세율구분 code published by the tariff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateType {
    A,
    C,
    E1,
    FAS1,
    FCA1,
    FCN1,
    FEU1,
    FUS1,
    FVN1,
    P1,
    P3,
    R,
    W1,
    W2,
}

impl RateType {
    /// Allowed for every lookup regardless of origin country.
    pub const BASE: [RateType; 6] = [
        RateType::A,
        RateType::C,
        RateType::P1,
        RateType::P3,
        RateType::W1,
        RateType::W2,
    ];

    pub fn code(self) -> &'static str {
        match self {
            RateType::A => "A",
            RateType::C => "C",
            RateType::E1 => "E1",
            RateType::FAS1 => "FAS1",
            RateType::FCA1 => "FCA1",
            RateType::FCN1 => "FCN1",
            RateType::FEU1 => "FEU1",
            RateType::FUS1 => "FUS1",
            RateType::FVN1 => "FVN1",
            RateType::P1 => "P1",
            RateType::P3 => "P3",
            RateType::R => "R",
            RateType::W1 => "W1",
            RateType::W2 => "W2",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RateType::A => "A (기본세율)",
            RateType::C => "C (WTO협정세율)",
            RateType::E1 => "E1 (아ㆍ태 협정-일반양허관세)",
            RateType::FAS1 => "FAS1 (한-아세안 협정관세)",
            RateType::FCA1 => "FCA1 (한-캐나다 협정관세)",
            RateType::FCN1 => "FCN1 (한-중국 협정관세)",
            RateType::FEU1 => "FEU1 (한-유럽연합 협정관세)",
            RateType::FUS1 => "FUS1 (한-미국 협정관세)",
            RateType::FVN1 => "FVN1 (한-베트남 협정관세)",
            RateType::P1 => "P1 (할당관세-추천)",
            RateType::P3 => "P3 (할당관세-전량)",
            RateType::R => "R (최빈국 특혜관세)",
            RateType::W1 => "W1 (WTO 협정관세-추천세율)",
            RateType::W2 => "W2 (WTO 협정관세-미추천세율)",
        }
    }

    pub fn is_base(self) -> bool {
        Self::BASE.contains(&self)
    }
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RateType {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self> {
        let rate_type = match s.trim() {
            "A" => RateType::A,
            "C" => RateType::C,
            "E1" => RateType::E1,
            "FAS1" => RateType::FAS1,
            "FCA1" => RateType::FCA1,
            "FCN1" => RateType::FCN1,
            "FEU1" => RateType::FEU1,
            "FUS1" => RateType::FUS1,
            "FVN1" => RateType::FVN1,
            "P1" => RateType::P1,
            "P3" => RateType::P3,
            "R" => RateType::R,
            "W1" => RateType::W1,
            "W2" => RateType::W2,
            other => {
                return Err(TariffError::invalid_input(format!(
                    "unknown rate type code: {}",
                    other
                )))
            }
        };
        Ok(rate_type)
    }
}

macro_rules! countries {
    ($($variant:ident => $name:literal, [$($extra:ident),*];)*) => {
        /// Origin country with at least one agreement rate type on top of the base set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Country {
            $($variant,)*
        }

        impl Country {
            pub const ALL: &'static [Country] = &[$(Country::$variant,)*];

            pub fn code(self) -> &'static str {
                match self {
                    $(Country::$variant => stringify!($variant),)*
                }
            }

            pub fn korean_name(self) -> &'static str {
                match self {
                    $(Country::$variant => $name,)*
                }
            }

            /// Agreement rate types this origin may claim, primary agreement first.
            pub fn extra_rate_types(self) -> &'static [RateType] {
                match self {
                    $(Country::$variant => &[$(RateType::$extra),*],)*
                }
            }
        }
    };
}

countries! {
    CHN => "중국", [FCN1, E1];
    IND => "인도", [E1];
    LKA => "스리랑카", [E1];
    BGD => "방글라데시", [E1];
    LAO => "라오스", [FAS1, E1];
    MNG => "몽골", [E1];
    VNM => "베트남", [FVN1, FAS1];
    MMR => "미얀마", [FAS1];
    SGP => "싱가포르", [FAS1];
    MYS => "말레이시아", [FAS1];
    IDN => "인도네시아", [FAS1];
    PHL => "필리핀", [FAS1];
    BRN => "브루나이", [FAS1];
    KHM => "캄보디아", [FAS1];
    THA => "태국", [FAS1];
    CAN => "캐나다", [FCA1];
    USA => "미국", [FUS1];
    GRC => "그리스", [FEU1];
    NLD => "네덜란드", [FEU1];
    DNK => "덴마크", [FEU1];
    DEU => "독일", [FEU1];
    LVA => "라트비아", [FEU1];
    ROU => "루마니아", [FEU1];
    LUX => "룩셈부르크", [FEU1];
    LTU => "리투아니아", [FEU1];
    MLT => "몰타", [FEU1];
    BEL => "벨기에", [FEU1];
    BGR => "불가리아", [FEU1];
    CYP => "사이프러스", [FEU1];
    SWE => "스웨덴", [FEU1];
    ESP => "스페인", [FEU1];
    SVK => "슬로바키아", [FEU1];
    SVN => "슬로베니아", [FEU1];
    IRL => "아일랜드", [FEU1];
    EST => "에스토니아", [FEU1];
    AUT => "오스트리아", [FEU1];
    ITA => "이탈리아", [FEU1];
    CZE => "체코", [FEU1];
    PRT => "포르투갈", [FEU1];
    POL => "폴란드", [FEU1];
    FRA => "프랑스", [FEU1];
    FIN => "핀란드", [FEU1];
    HUN => "헝가리", [FEU1];
    HRV => "크로아티아", [FEU1];
}

impl Country {
    pub fn primary_rate_type(self) -> RateType {
        // every country in the table carries at least one agreement type
        self.extra_rate_types()[0]
    }

    /// `None` for the "no country selected" spellings (`""`, `ALL`).
    pub fn parse_optional(s: &str) -> Result<Option<Country>> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("ALL") {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Country::ALL
            .iter()
            .copied()
            .find(|c| c.code() == upper)
            .ok_or_else(|| TariffError::invalid_input(format!("unsupported country code: {}", s)))
    }
}

/// Delivery term groups that share one CIF derivation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Incoterm {
    ExwFca,
    Fob,
    CfrCif,
    DapDdp,
}

impl Incoterm {
    pub fn label(self) -> &'static str {
        match self {
            Incoterm::ExwFca => "EXW/FCA",
            Incoterm::Fob => "FOB",
            Incoterm::CfrCif => "CFR/CIF",
            Incoterm::DapDdp => "DAP/DDP",
        }
    }

    /// Under DAP/DDP the destination costs are already inside the invoice price.
    pub fn nets_out_other_costs(self) -> bool {
        matches!(self, Incoterm::DapDdp)
    }
}

impl fmt::Display for Incoterm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Incoterm {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "/");
        match normalized.as_str() {
            "EXW/FCA" | "EXW" | "FCA" => Ok(Incoterm::ExwFca),
            "FOB" => Ok(Incoterm::Fob),
            "CFR/CIF" | "CFR" | "CIF" => Ok(Incoterm::CfrCif),
            "DAP/DDP" | "DAP" | "DDP" => Ok(Incoterm::DapDdp),
            _ => Err(TariffError::invalid_input(format!("unknown incoterm: {}", s))),
        }
    }
}

/// 재질코드 used on the bulk upload sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Material {
    Plastic,
    Rubber,
    Ceramic,
    Glass,
    Textile,
    Leather,
    Metal,
    Paper,
    Wood,
    Unknown,
}

impl Material {
    /// Unknown or blank codes fall back to `Material::Unknown`.
    pub fn from_code(code: &str) -> Material {
        match code.trim().to_ascii_uppercase().as_str() {
            "P" => Material::Plastic,
            "R" => Material::Rubber,
            "C" => Material::Ceramic,
            "G" => Material::Glass,
            "T" => Material::Textile,
            "L" => Material::Leather,
            "M" => Material::Metal,
            "PA" => Material::Paper,
            "W" => Material::Wood,
            _ => Material::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Material::Plastic => "P",
            Material::Rubber => "R",
            Material::Ceramic => "C",
            Material::Glass => "G",
            Material::Textile => "T",
            Material::Leather => "L",
            Material::Metal => "M",
            Material::Paper => "PA",
            Material::Wood => "W",
            Material::Unknown => "N",
        }
    }

    pub fn korean_name(self) -> &'static str {
        match self {
            Material::Plastic => "플라스틱제",
            Material::Rubber => "고무제",
            Material::Ceramic => "도자제",
            Material::Glass => "유리제",
            Material::Textile => "방직용 섬유제",
            Material::Leather => "가죽제",
            Material::Metal => "금속제",
            Material::Paper => "종이제",
            Material::Wood => "나무제",
            Material::Unknown => "모르거나 해당사항 없음",
        }
    }
}

/// Quota class of an expensive lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Single,
    Bulk,
}

impl SearchType {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::Single => "single",
            SearchType::Bulk => "bulk",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(SearchType::Single),
            "bulk" => Ok(SearchType::Bulk),
            other => Err(TariffError::invalid_input(format!(
                "search type must be \"single\" or \"bulk\", got {:?}",
                other
            ))),
        }
    }
}

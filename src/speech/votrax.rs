//! Votrax SC-01 to SSI263 phoneme translation
//!
//! Software written for the Votrax-based speech boards sends SC-01 phoneme
//! codes through port B. The card answers them with the closest SSI263
//! phoneme.

use super::PHONEME_MASK;

/// SC-01 code -> SSI263 code
#[rustfmt::skip]
static VOTRAX_TO_SSI263: [u8; 64] = [
    0x02, // 00: EH3 jackEt  -> E1 bEnt
    0x0A, // 01: EH2 Enlist  -> EH nEst
    0x0B, // 02: EH1 hEAvy   -> EH1 bElt
    0x00, // 03: PA0 no sound -> PA
    0x28, // 04: DT buTTer   -> T Tart
    0x08, // 05: A2 mAde     -> A nAme
    0x08, // 06: A1 mAde     -> A nAme
    0x2F, // 07: ZH aZure    -> Z Zero
    0x0E, // 08: AH2 hOnest  -> AH gOt
    0x07, // 09: I3 inhibIt  -> I sIx
    0x07, // 0A: I2 Inhibit  -> I sIx
    0x07, // 0B: I1 inhIbit  -> I sIx
    0x37, // 0C: M Mat       -> M Mat
    0x38, // 0D: N suN       -> N NiNe
    0x24, // 0E: B Bag       -> B Bag
    0x33, // 0F: V Van       -> V Very
    0x32, // 10: CH CHip     -> SCH SHip
    0x32, // 11: SH SHop     -> SCH SHip
    0x2F, // 12: Z Zoo       -> Z Zero
    0x10, // 13: AW1 lAWful  -> AW Office
    0x39, // 14: NG thiNG    -> NG raNG
    0x0F, // 15: AH1 fAther  -> AH1 fAther
    0x13, // 16: OO1 lOOking -> OO lOOk
    0x13, // 17: OO bOOk     -> OO lOOk
    0x20, // 18: L Land      -> L Land
    0x29, // 19: K triCK     -> K Kit
    0x25, // 1A: J juDGe     -> D paiD
    0x2C, // 1B: H Hello     -> HF Heart
    0x26, // 1C: G Get       -> KV taG
    0x25, // 1D: D paiD      -> D paiD
    0x34, // 1E: F Fast      -> F Four
    0x30, // 1F: S paSS      -> S Same
    0x08, // 20: A dAY       -> A nAme
    0x09, // 21: AY dAY      -> AY nAme
    0x03, // 22: Y1 Yard     -> YI Year
    0x1B, // 23: UH3 missIOn -> UH3 nUt
    0x0E, // 24: AH mOp      -> AH gOt
    0x27, // 25: P Past      -> P Pen
    0x11, // 26: O cOld      -> O stOre
    0x07, // 27: I pIn       -> I sIx
    0x16, // 28: U mOve      -> U tUne
    0x05, // 29: Y anY       -> AI cAre
    0x28, // 2A: T Tap       -> T Tart
    0x1D, // 2B: R Red       -> R Rug
    0x01, // 2C: E mEEt      -> E mEEt
    0x23, // 2D: W Win       -> W Water
    0x0C, // 2E: AE dAd      -> AE dAd
    0x0D, // 2F: AE1 After   -> AE1 After
    0x10, // 30: AW2 sAlty   -> AW Office
    0x1A, // 31: UH2 About   -> UH2 kOOk
    0x19, // 32: UH1 Uncle   -> UH1 Love
    0x18, // 33: UH cUp      -> UH cUp
    0x11, // 34: O2 fOr      -> O stOre
    0x11, // 35: O1 abOArd   -> O stOre
    0x14, // 36: IU yOU      -> IU yOU
    0x14, // 37: U1 yOU      -> IU yOU
    0x35, // 38: THV THe     -> THV THere
    0x36, // 39: TH THin     -> TH THin
    0x1C, // 3A: ER bIrd     -> ER bIrd
    0x0A, // 3B: EH gEt      -> EH nEst
    0x01, // 3C: E1 bE       -> E mEEt
    0x10, // 3D: AW cAll     -> AW Office
    0x00, // 3E: PA1 no sound -> PA
    0x00, // 3F: STOP no sound -> PA
];

/// Translate an SC-01 phoneme (low 6 bits used) to its SSI263 equivalent
pub fn translate(votrax: u8) -> u8 {
    VOTRAX_TO_SSI263[(votrax & PHONEME_MASK) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_entries() {
        assert_eq!(translate(0x03), 0x00);
        assert_eq!(translate(0x1D), 0x25);
        assert_eq!(translate(0x3F), 0x00);
        assert_eq!(translate(0x0C), 0x37);
    }

    #[test]
    fn test_upper_bits_ignored() {
        assert_eq!(translate(0xC3), translate(0x03));
        assert_eq!(translate(0x5D), 0x25);
    }

    #[test]
    fn test_output_is_six_bit() {
        assert!((0..=255u8).all(|code| translate(code) <= PHONEME_MASK));
    }
}

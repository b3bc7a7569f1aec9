//! Japanese ↔ Korean label lexicon
//!
//! The marketplace renders labels in Japanese while the report language is
//! Korean. Every pattern that matches page text is an alternation over both
//! variants, compiled once at startup. `translate` maps extracted Japanese
//! text into Korean for user-facing output.

use lazy_static::lazy_static;
use regex::Regex;

/// Japanese → Korean label pairs. Longer keys first so compound labels are
/// replaced before their sub-words.
pub const JP_KR_PAIRS: &[(&str, &str)] = &[
    // coupons / discounts
    ("ショップお気に入り割引", "샵즐겨찾기할인"),
    ("お気に入り登録", "즐겨찾기등록"),
    ("クーポン割引", "쿠폰할인"),
    ("クーポン", "쿠폰"),
    ("割引", "할인"),
    ("プラス", "플러스"),
    ("最大", "최대"),
    // points
    ("Qポイント獲得方法", "Q포인트획득방법"),
    ("Qポイント獲得", "Q포인트획득"),
    ("Qポイント", "Q포인트"),
    ("ポイント", "포인트"),
    ("受取確認", "수령확인"),
    ("レビュー作成", "리뷰작성"),
    ("配送完了", "배송완료"),
    ("自動", "자동"),
    // prices
    ("商品価格", "상품가격"),
    ("販売価格", "판매가격"),
    ("セール価格", "세일가격"),
    ("割引価格", "할인가격"),
    ("元の価格", "원래가격"),
    ("元価格", "원가격"),
    ("定価", "정가"),
    ("価格", "가격"),
    ("円", "엔"),
    // shipping
    ("送料無料", "무료배송"),
    ("配送無料", "무료배송"),
    ("条件付無料", "조건부무료"),
    ("以上購入の際", "이상구매시"),
    ("以上購入", "이상구매"),
    ("配送料", "배송료"),
    ("送料", "배송비"),
    ("配送", "배송"),
    ("購入", "구매"),
    // returns
    ("返品無料サービス", "무료반품서비스"),
    ("返品無料", "무료반품"),
    ("無料返品", "무료반품"),
    ("返品可能", "반품가능"),
    ("返品", "반품"),
    ("返却", "반환"),
    // reviews
    ("レビュー", "리뷰"),
    ("評価数", "평가수"),
    ("評価", "평가"),
    ("コメント", "코멘트"),
    ("口コミ", "구전"),
    ("星", "별"),
    // shop
    ("ショップ名", "샵명"),
    ("ショップ", "샵"),
    ("フォロワー", "팔로워"),
    ("フォロー", "팔로우"),
    ("パワー", "파워"),
    // products
    ("全ての商品", "전체상품"),
    ("商品名", "상품명"),
    ("商品数", "상품수"),
    ("商品", "상품"),
    // category / brand
    ("カテゴリー", "카테고리"),
    ("カテゴリ", "카테고리"),
    ("ブランド", "브랜드"),
    ("メーカー", "메이커"),
];

/// Translate Japanese labels inside a string into Korean.
pub fn translate(text: &str) -> String {
    let mut out = text.to_string();
    for (jp, kr) in JP_KR_PAIRS {
        if out.contains(jp) {
            out = out.replace(jp, kr);
        }
    }
    out
}

lazy_static! {
    // -- prices --------------------------------------------------------------
    pub static ref PRICE_LABEL: Regex =
        Regex::new(r"(商品価格|상품가격|価格|가격)[：:]\s*(\d{1,3}(?:,\d{3})*)円").unwrap();
    pub static ref PRICE_YEN: Regex = Regex::new(r"(\d{1,3}(?:,\d{3})*)円").unwrap();
    pub static ref PRICE_SYMBOL: Regex = Regex::new(r"¥\s*(\d{1,3}(?:,\d{3})*)").unwrap();
    pub static ref STRIKETHROUGH_PRICE: Regex =
        Regex::new(r"~~(\d{1,3}(?:,\d{3})*)円~~").unwrap();
    pub static ref ORIGINAL_PRICE_CLASS: Regex =
        Regex::new(r"(?i)original|정가|定価|元の価格|元価格").unwrap();

    // -- coupons -------------------------------------------------------------
    pub static ref COUPON_LABEL: Regex =
        Regex::new(r"(クーポン割引|쿠폰할인|クーポン|쿠폰|ショップお気に入り割引|샵즐겨찾기할인)").unwrap();
    pub static ref COUPON_DISCOUNT: Regex =
        Regex::new(r"(?:プラス|플러스)(\d+)(?:割引|할인)|(?:最大|최대)(\d+)円").unwrap();
    pub static ref COUPON_PAREN_DISCOUNT: Regex =
        Regex::new(r"(?:クーポン割引|쿠폰할인)[_\s]*\((\d+)\)").unwrap();
    pub static ref COUPON_FAVORITE: Regex =
        Regex::new(r"(ショップお気に入り|샵즐겨찾기|お気に入り登録|즐겨찾기등록)").unwrap();
    pub static ref COUPON_PASSWORD: Regex =
        Regex::new(r"(?i)(パスワード|password|비밀번호)").unwrap();

    // -- points --------------------------------------------------------------
    pub static ref POINTS_LABEL: Regex =
        Regex::new(r"(Qポイント獲得方法|Q포인트획득방법|Qポイント獲得|Q포인트획득|Qポイント|Q포인트)").unwrap();
    pub static ref POINTS_RECEIVE: Regex =
        Regex::new(r"(?:受取確認|수령확인)[：:]\s*(?:最大|최대)(\d+)P").unwrap();
    pub static ref POINTS_REVIEW: Regex =
        Regex::new(r"(?:レビュー作成|리뷰작성)[：:]\s*(?:最大|최대)(\d+)P").unwrap();
    pub static ref POINTS_MAX: Regex = Regex::new(r"(?:最大|최대)(\d+)P").unwrap();
    pub static ref POINTS_AUTO: Regex =
        Regex::new(r"(?:配送完了|배송완료).*(?:自動|자동).*?(\d+)P").unwrap();

    // -- shipping ------------------------------------------------------------
    pub static ref SHIPPING_LABEL: Regex =
        Regex::new(r"(送料|배송비|配送料|배송료|配送|배송|(?i:shipping))").unwrap();
    pub static ref FREE_SHIPPING: Regex =
        Regex::new(r"(送料無料|무료배송|配送無料|無料|무료|(?i:free))").unwrap();
    pub static ref SHIPPING_FEE: Regex =
        Regex::new(r"(?:送料|配送料|배송비|배송료)[：:]\s*(\d{1,3}(?:,\d{3})*)円").unwrap();

    // -- returns -------------------------------------------------------------
    pub static ref RETURN_LABEL: Regex =
        Regex::new(r"(返品|반품|返却|반환|(?i:return))").unwrap();
    pub static ref FREE_RETURN: Regex =
        Regex::new(r"(返品無料|무료반품|無料返品|返品無料サービス|무료반품서비스)").unwrap();

    // -- reviews -------------------------------------------------------------
    pub static ref RATING_WITH_COUNT: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)\s*\((\d+)\)").unwrap();
    pub static ref REVIEW_COUNT_PAREN: Regex =
        Regex::new(r"(?:レビュー|리뷰|評価|평가).*?\((\d+)\)").unwrap();

    // -- promoted listings ---------------------------------------------------
    pub static ref PROMOTED_BADGE: Regex = Regex::new(r"(?i)(MOVE|ムーブ)").unwrap();

    // -- shop ----------------------------------------------------------------
    pub static ref FOLLOWER_COUNT: Regex =
        Regex::new(r"(?:フォロワー|팔로워)[_\s]*(\d{1,3}(?:,\d{3})*)").unwrap();
    pub static ref SHOP_PRODUCT_COUNT: Regex =
        Regex::new(r"(?:全ての商品|전체상품|商品数|상품수).*?\((\d+)\)").unwrap();
    pub static ref POWER_SELLER: Regex = Regex::new(r"(POWER|パワー|파워)").unwrap();
    pub static ref EXCELLENT_SELLER: Regex = Regex::new(r"(優良|우수|(?i:excellent))").unwrap();

    // -- brand / generic labels ---------------------------------------------
    pub static ref BRAND_LABEL: Regex = Regex::new(r"(ブランド|브랜드|(?i:brand))").unwrap();
}

/// Parse "4,562" / "4562円" style price text into a number.
pub fn parse_price(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_compound_labels_first() {
        assert_eq!(translate("送料無料"), "무료배송");
        assert_eq!(translate("クーポン割引: 最大300円"), "쿠폰할인: 최대300엔");
    }

    #[test]
    fn price_label_matches_both_languages() {
        assert!(PRICE_LABEL.is_match("商品価格: 4,562円"));
        assert!(PRICE_LABEL.is_match("상품가격: 4,562円"));
    }

    #[test]
    fn points_patterns_extract_values() {
        let text = "Qポイント獲得方法 受取確認: 最大1P レビュー作成: 最大20P";
        assert_eq!(&POINTS_RECEIVE.captures(text).unwrap()[1], "1");
        assert_eq!(&POINTS_REVIEW.captures(text).unwrap()[1], "20");
    }

    #[test]
    fn parse_price_strips_separators() {
        assert_eq!(parse_price("29,400円"), Some(29400));
        assert_eq!(parse_price("なし"), None);
    }

    #[test]
    fn rating_with_count_splits_both_numbers() {
        let caps = RATING_WITH_COUNT.captures("4.6(184)").unwrap();
        assert_eq!(&caps[1], "4.6");
        assert_eq!(&caps[2], "184");
    }
}

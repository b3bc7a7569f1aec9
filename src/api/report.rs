//! Markdown rendering of a completed report
//!
//! The download endpoint serves markdown inline; PDF/Excel renderers are
//! external collaborators and are not linked into this service.

use crate::models::{ItemStatus, Job, Report};

pub fn render_markdown(job: &Job, report: &Report) -> String {
    let mut out = String::new();

    if let Some(product) = &report.product {
        out.push_str(&format!("# 상품 분석 리포트: {}\n\n", product.name));
        out.push_str(&format!("- 상품 코드: `{}`\n", product.code));
        out.push_str(&format!("- URL: {}\n", product.url));
        if let Some(sale) = product.price.sale {
            out.push_str(&format!("- 판매가: {}엔", sale));
            if let Some(original) = product.price.original {
                out.push_str(&format!(
                    " (정가 {}엔, 할인율 {}%)",
                    original, product.price.discount_rate
                ));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "- 리뷰: {:.1}점 ({}건)\n",
            product.reviews.rating, product.reviews.count
        ));
    } else if let Some(shop) = &report.shop {
        out.push_str(&format!("# Shop 분석 리포트: {}\n\n", shop.name));
        out.push_str(&format!("- Shop ID: `{}`\n", shop.id));
        out.push_str(&format!("- 팔로워: {}명\n", shop.follower_count));
        out.push_str(&format!("- 등록 상품: {}개\n", shop.product_count));
    }

    out.push_str(&format!("- 분석 일시: {}\n", job.created_at.to_rfc3339()));

    if let Some(analysis) = &report.analyzer_result {
        out.push_str("\n## 종합 점수\n\n");
        out.push_str(&format!("**{}점 / 100점**\n\n", analysis.overall_score));
        out.push_str("| 항목 | 점수 |\n|---|---|\n");
        for (name, score) in [
            ("이미지", analysis.image_analysis.score),
            ("상품 설명", analysis.description_analysis.score),
            ("가격", analysis.price_analysis.score),
            ("리뷰", analysis.review_analysis.score),
            ("SEO", analysis.seo_analysis.score),
            ("페이지 구조", analysis.structure_analysis.score),
        ] {
            out.push_str(&format!("| {} | {} |\n", name, score));
        }
    }
    if let Some(analysis) = &report.shop_analyzer_result {
        out.push_str("\n## 종합 점수\n\n");
        out.push_str(&format!("**{}점 / 100점**\n", analysis.overall_score));
    }

    if !report.recommendations.is_empty() {
        out.push_str("\n## 개선 제안\n\n");
        for rec in &report.recommendations {
            out.push_str(&format!(
                "### [{}] {}\n\n{}\n\n",
                rec.category, rec.title, rec.description
            ));
            for action in &rec.action_items {
                out.push_str(&format!("- {}\n", action));
            }
            out.push('\n');
        }
    }

    if let Some(checklist) = &report.checklist_outcome {
        out.push_str(&format!(
            "\n## 체크리스트 ({}% 완료)\n\n",
            checklist.overall_completion
        ));
        for category in &checklist.categories {
            out.push_str(&format!(
                "### {} ({}%)\n\n",
                category.name, category.completion
            ));
            for item in &category.items {
                let mark = match item.status {
                    ItemStatus::Completed => "x",
                    ItemStatus::Pending | ItemStatus::Manual => " ",
                };
                out.push_str(&format!("- [{}] {}", mark, item.title));
                if let Some(rec) = &item.recommendation {
                    out.push_str(&format!(" — {}", rec));
                }
                out.push('\n');
            }
            out.push('\n');
        }
    }

    if let Some(validation) = &report.validation_outcome {
        out.push_str("\n## 데이터 검증\n\n");
        out.push_str(&format!(
            "- 검증 점수: {:.0}점, {}\n",
            validation.score,
            if validation.valid { "일치" } else { "불일치 있음" }
        ));
        if !validation.corrected_fields.is_empty() {
            out.push_str(&format!(
                "- 자동 보정된 필드: {}\n",
                validation.corrected_fields.join(", ")
            ));
        }
    }

    out
}

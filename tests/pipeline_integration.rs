//! End-to-end pipeline tests over canned HTML, no network.
//!
//! Drives parse → analyze → recommend → checklist → validate the same way
//! the orchestrator does, then checks the cross-stage invariants: weighted
//! scores, drift correction, chunk feedback and monitor aggregates.

use shoplens_backend::analysis::checklist::EvalData;
use shoplens_backend::analysis::{ChecklistEvaluator, DataValidator, ProductAnalyzer, Recommender};
use shoplens_backend::models::{DataSource, ItemStatus, Stage, UrlKind};
use shoplens_backend::pipeline::monitor::{PeriodType, PipelineMonitor, StageStatus};
use shoplens_backend::pipeline::JobStore;
use shoplens_backend::scrapers::product::ProductParser;
use shoplens_backend::store::PerformanceStore;
use std::sync::Arc;

const PRODUCT_PAGE: &str = r#"
<html>
<head>
    <title>プレミアム ビタミンC セラム 30ml 美容液 | Qoo10</title>
    <meta name="keywords" content="セラム, ビタミンC, 美容液">
    <meta name="description" content="高濃度ビタミンC配合の美容液。毎日のスキンケアに最適です。敏感肌にも使えるマイルド処方で、朝晩の使用をおすすめします。">
</head>
<body>
    <div class="goods_name_wrap"><h1 class="product-name">プレミアム ビタミンC セラム 30ml 美容液</h1></div>
    <nav class="breadcrumb"><a href="/">ホーム</a><a href="/category/beauty">ビューティー</a></nav>
    <div class="goods_price_wrap">
        <span class="price">商品価格: 4,562円</span>
        <del>5,980円</del>
    </div>
    <div class="goods_img"><img class="product-thumbnail" src="//img.qoo10.jp/item/thumb.jpg"></div>
    <div class="goods_detail_wrap">
        <div class="goods_detail">
            <img src="/item/detail1.jpg">
            <img src="/item/detail2.jpg">
            <img src="/item/detail3.jpg">
        </div>
    </div>
    <span class="rating">4.6(184)</span>
    <div class="review_list">
        <div class="review-item">とても良い商品でした。リピートします。</div>
        <div class="review-item">肌がつるつるになりました。おすすめです。</div>
    </div>
    <a href="/shop/beauty-lab">ビューティーラボ公式</a>
    <span>POWER</span>
    <td>送料無料</td>
    <td>返品無料サービス対応</td>
    <li>Qポイント獲得方法 受取確認: 最大1P レビュー作成: 最大20P</li>
    <li>クーポン割引 プラス300割引 お気に入り登録</li>
</body>
</html>
"#;

fn parse_product(store: &Arc<PerformanceStore>, url: &str) -> shoplens_backend::models::ProductRecord {
    ProductParser::new(store.clone())
        .parse(PRODUCT_PAGE, url, DataSource::HtmlFetch)
        .expect("product page should parse")
}

#[tokio::test]
async fn happy_product_pipeline_produces_consistent_report() {
    let store = Arc::new(PerformanceStore::in_memory().unwrap());
    let record = parse_product(&store, "https://www.qoo10.jp/g/1093098159");

    assert_eq!(record.code, "1093098159");
    let sale = record.price.sale.expect("sale price");
    assert!((100..=1_000_000).contains(&sale));
    assert!(record.price.original.unwrap() >= sale);
    assert!(record
        .images
        .detail
        .iter()
        .all(|u| u.starts_with("http://") || u.starts_with("https://")));

    let analyzer = ProductAnalyzer::new();
    let mut analysis = analyzer.analyze(&record).await;
    assert!(analysis.overall_score <= 100);
    for score in [
        analysis.image_analysis.score,
        analysis.description_analysis.score,
        analysis.price_analysis.score,
        analysis.review_analysis.score,
        analysis.seo_analysis.score,
        analysis.structure_analysis.score,
    ] {
        assert!(score <= 100);
    }

    let recommendations = Recommender::new().for_product(&record, &analysis);
    for pair in recommendations.windows(2) {
        assert!(pair[0].priority >= pair[1].priority);
    }

    let checklist = ChecklistEvaluator::new()
        .evaluate(Arc::new(EvalData {
            product: Some(record.clone()),
            shop: None,
            analysis: Some(analysis.clone()),
            structure: record.page_structure.clone(),
        }))
        .await;
    assert!(checklist.overall_completion <= 100);
    assert!(checklist.has_completed_item(&["item_001"]));
    // Points and coupon were extracted, so their checklist items must pass.
    assert!(checklist.has_completed_item(&["item_006b"]));
    assert!(checklist.has_completed_item(&["item_011"]));

    let validator = DataValidator::new();
    let validation = validator.validate(&record, &mut analysis, Some(&checklist));
    assert!(validation.valid, "fresh pipeline output should be consistent");
    assert!(validation.mismatches.iter().all(|m| m.corrected));
}

#[tokio::test]
async fn drift_correction_feeds_chunks_back_to_the_store() {
    let store = Arc::new(PerformanceStore::in_memory().unwrap());
    let record = parse_product(&store, "https://www.qoo10.jp/g/42424242");

    let analyzer = ProductAnalyzer::new();
    let mut analysis = analyzer.analyze(&record).await;

    // Inject drift into the derived price, as if a downstream stage rewrote it.
    analysis.price_analysis.sale_price = Some(9_999);

    let validator = DataValidator::new();
    let validation = validator.validate(&record, &mut analysis, None);

    assert!(validation.corrected_fields.contains(&"price_sale".to_string()));
    assert_eq!(analysis.price_analysis.sale_price, record.price.sale);
    let mismatch = validation
        .mismatches
        .iter()
        .find(|m| m.field == "price_sale")
        .expect("price drift must be recorded");
    assert!(mismatch.corrected);
    assert!(validation.valid, "corrected mismatches keep the report valid");

    let chunks = validator.extract_chunks(&validation, &record, record.page_structure.as_ref());
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        store.add_chunk(chunk).unwrap();
    }
    let stored = store.chunks_for_field("price_sale").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].context.code.as_deref(), Some("42424242"));
}

#[test]
fn url_variants_normalize_to_one_record() {
    let store = Arc::new(PerformanceStore::in_memory().unwrap());
    let codes: Vec<String> = [
        "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1234",
        "https://www.qoo10.jp/g/1234",
        "https://www.qoo10.jp/item/vitamin-serum/1234",
    ]
    .iter()
    .map(|url| parse_product(&store, url))
    .map(|record| {
        assert_eq!(
            record.url,
            "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1234"
        );
        record.code
    })
    .collect();
    assert!(codes.iter().all(|c| c == "1234"));
}

#[test]
fn selector_learning_converges_on_the_working_rule() {
    let store = Arc::new(PerformanceStore::in_memory().unwrap());

    // A page where the first default name selectors fail repeatedly.
    let sparse = r#"<html><head><title>USB卓上加湿器 静音モデル | Qoo10</title></head>
        <body><div class="wrap"><span class="price">1,980円</span></div></body></html>"#;
    let parser = ProductParser::new(store.clone());
    for _ in 0..5 {
        parser
            .parse(sparse, "https://www.qoo10.jp/g/777", DataSource::HtmlFetch)
            .unwrap();
    }

    let stats = store.best_selectors("product_name", 20).unwrap();
    let failing = stats
        .iter()
        .find(|s| s.selector == "h1.product-name")
        .expect("default selector outcome must be recorded");
    assert!(failing.failures >= 5);
    assert_eq!(failing.successes, 0);

    // A ranked batch is dominated by whatever succeeds most.
    for _ in 0..10 {
        store
            .record_selector("product_name", ".goods_title", true, 1.0)
            .unwrap();
    }
    let best = store.best_selectors("product_name", 1).unwrap();
    assert_eq!(best[0].selector, ".goods_title");
}

#[tokio::test]
async fn checklist_budget_overrun_degrades_but_does_not_fail() {
    use shoplens_backend::analysis::checklist::{CategoryDef, EvalVerdict, ItemDef};

    fn slow(_: &EvalData) -> EvalVerdict {
        std::thread::sleep(std::time::Duration::from_millis(500));
        EvalVerdict {
            passed: true,
            recommendation: None,
        }
    }

    let catalog = vec![CategoryDef {
        name: "테스트",
        items: vec![ItemDef {
            id: "slow_item",
            title: "느린 평가",
            evaluator: Some(slow),
            structure_field: None,
        }],
    }];

    let evaluator = ChecklistEvaluator::with_timeout(std::time::Duration::from_millis(50));
    let outcome = evaluator
        .evaluate_catalog(catalog, Arc::new(EvalData::default()))
        .await;

    let item = &outcome.categories[0].items[0];
    assert_eq!(item.status, ItemStatus::Pending);
    assert!(item.recommendation.as_deref().unwrap().contains("건너뛰었습니다"));
}

#[test]
fn monitor_aggregates_ten_jobs_with_two_failures() {
    let store = Arc::new(PerformanceStore::in_memory().unwrap());
    let monitor = PipelineMonitor::new(store);

    for i in 0..10 {
        let status = if i < 8 {
            StageStatus::Success
        } else {
            StageStatus::Failure
        };
        monitor.record_stage(
            &format!("job-{}", i),
            "https://www.qoo10.jp/g/1",
            UrlKind::Product,
            Stage::Crawling,
            status,
            1_200,
            None,
            (status == StageStatus::Failure).then_some("HTTP 429"),
        );
    }

    let rates = monitor.get_success_rates(PeriodType::Day, 1).unwrap();
    let crawling = rates.iter().find(|r| r.stage == "crawling").unwrap();
    assert_eq!(crawling.total, 10);
    assert_eq!(crawling.success, 8);
    assert_eq!(crawling.failure, 2);
    assert!((crawling.success_rate - 80.0).abs() < 1e-9);
}

#[test]
fn job_store_terminal_states_hold_their_invariants() {
    let jobs = JobStore::new();

    let completed = jobs.create("https://www.qoo10.jp/g/1", UrlKind::Product);
    jobs.mark_running(&completed.id);
    jobs.update_progress(&completed.id, "crawling", 20, "수집 중");
    jobs.set_result(
        &completed.id,
        shoplens_backend::models::Report {
            product: None,
            shop: None,
            analyzer_result: None,
            shop_analyzer_result: None,
            recommendations: vec![],
            checklist_outcome: None,
            validation_outcome: None,
            data_source: DataSource::HtmlFetch,
        },
    );
    let snapshot = jobs.get(&completed.id).unwrap();
    assert_eq!(snapshot.progress.percent, 100);
    assert!(snapshot.result.is_some());
    assert!(snapshot.error.is_none());

    let failed = jobs.create("https://www.qoo10.jp/g/2", UrlKind::Product);
    jobs.mark_running(&failed.id);
    jobs.update_progress(&failed.id, "crawling", 10, "수집 중");
    jobs.set_error(&failed.id, "네트워크 오류가 발생했습니다");
    let snapshot = jobs.get(&failed.id).unwrap();
    assert!(snapshot.result.is_none());
    assert!(snapshot.error.is_some());
    assert_eq!(snapshot.progress.percent, 10);
}

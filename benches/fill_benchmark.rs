//! Benchmarks for template filling.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use mailmerge::{
    CollectingDiagnostics, FillOptions, FormatSpec, MemoryPage, MemoryTemplate, Record,
    RecordFormatter, SubstitutionEngine, TextRun,
};

/// Build a letter-size PDF whose pages each carry a few placeholder lines.
fn create_test_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let lines = [
        "Contract for {first_name name}",
        "Daily rate: {brut_day}",
        "Address: {street, number}",
        "Signed: {name}",
    ];

    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..page_count {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Real(12.0)]),
                Operation::new(
                    "Td",
                    vec![Object::Real(72.0), Object::Real(700.0 - 20.0 * i as f32)],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(line.as_bytes().to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn create_memory_template(page_count: usize) -> MemoryTemplate {
    (0..page_count).fold(MemoryTemplate::new(), |template, _| {
        template.with_page(
            MemoryPage::new()
                .with_run(TextRun::new("Contract for {first_name name}", 72.0, 90.0))
                .with_run(TextRun::new("Daily rate: {brut_day}", 72.0, 110.0))
                .with_run(TextRun::new("Address: {street, number}", 72.0, 130.0)),
        )
    })
}

fn employee() -> Record {
    let record = Record::new()
        .with("name", "Wiliam")
        .with("first_name", "John")
        .with("brut_day", 12.345)
        .with("street", "Main St")
        .with("number", 12);
    RecordFormatter::default()
        .with_formats(FormatSpec::new().with("brut_day", ".2f"))
        .normalize(&record)
        .unwrap()
}

/// Benchmark placeholder extraction on page text.
fn bench_placeholder_extraction(c: &mut Criterion) {
    let text = "Contract for {first_name name}\nDaily rate: {brut_day}\n".repeat(50);

    c.bench_function("extract_placeholders", |b| {
        b.iter(|| mailmerge::extract_placeholders(black_box(&text)));
    });
}

/// Benchmark record normalization.
fn bench_normalize(c: &mut Criterion) {
    let formatter = RecordFormatter::default().with_formats(FormatSpec::new().with("brut_day", ".2f"));
    let record = Record::new()
        .with("name", "Wiliam")
        .with("first_name", "John")
        .with("brut_day", 12.345)
        .with("street", "Main St")
        .with("number", 12);

    c.bench_function("normalize_record", |b| {
        b.iter(|| formatter.normalize(black_box(&record)).unwrap());
    });
}

/// Benchmark substitution over the in-memory model.
fn bench_memory_fill(c: &mut Criterion) {
    let record = employee();
    let template = create_memory_template(10);

    c.bench_function("memory_fill_10_pages", |b| {
        b.iter(|| {
            let diagnostics = CollectingDiagnostics::new();
            let mut template = template.clone();
            SubstitutionEngine::new(FillOptions::default(), &diagnostics)
                .fill(&mut template, black_box(&record))
                .unwrap()
        });
    });
}

/// Benchmark filling real PDF documents at various sizes.
fn bench_pdf_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdf_fill");
    let record = employee();

    for page_count in [1, 5, 10].iter() {
        let data = create_test_pdf(*page_count);

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| {
                let diagnostics = CollectingDiagnostics::new();
                mailmerge::fill_template_bytes(
                    black_box(&data),
                    &record,
                    FillOptions::default(),
                    &diagnostics,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_placeholder_extraction,
    bench_normalize,
    bench_memory_fill,
    bench_pdf_fill,
);
criterion_main!(benches);

use image::{GrayImage, Luma, Rgb, RgbImage};
use insta::assert_snapshot;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mangaquick_rust::collaborators::{
    CollabFuture, CopyInpainter, Inpainter, MaskFileSegmenter, TextRecognizer,
    TranslationBackend, TranslationContext,
};
use mangaquick_rust::pipeline::{NoProgress, PipelineOptions};
use mangaquick_rust::regions::read_region_list;
use mangaquick_rust::typeset::Typesetter;
use mangaquick_rust::{
    BatchState, Collaborators, CoreError, OperatorRect, Pipeline, Rect, RegionList, Stage,
};

struct NumberedRecognizer;

impl TextRecognizer for NumberedRecognizer {
    fn recognize<'a>(
        &'a self,
        _image: &'a RgbImage,
        regions: &'a RegionList,
    ) -> CollabFuture<'a, Vec<String>> {
        Box::pin(async move {
            Ok((0..regions.len())
                .map(|index| format!("せりふ{}", index))
                .collect())
        })
    }
}

struct ShortRecognizer;

impl TextRecognizer for ShortRecognizer {
    fn recognize<'a>(
        &'a self,
        _image: &'a RgbImage,
        _regions: &'a RegionList,
    ) -> CollabFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}

#[derive(Default, Clone)]
struct RecordingTranslator {
    calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl TranslationBackend for RecordingTranslator {
    fn name(&self) -> &str {
        "recording"
    }

    fn translate<'a>(
        &'a self,
        text: &'a str,
        target_lang: &'a str,
        context: &'a TranslationContext,
    ) -> CollabFuture<'a, String> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((text.to_string(), context.prior.len()));
            }
            Ok(format!("LINE {} ({})", text.len(), target_lang))
        })
    }
}

struct BrokenInpainter;

impl Inpainter for BrokenInpainter {
    fn inpaint<'a>(&'a self, _input_dir: &'a Path, _output_dir: &'a Path) -> CollabFuture<'a, ()> {
        Box::pin(async move { Err(CoreError::Collaborator("model crashed".to_string())) })
    }
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["pages", "masks", "edits"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn work_dir(&self) -> PathBuf {
        self.path("work")
    }

    /// A 160x100 white page plus a mask with one filled box per rect.
    fn add_page(&self, name: &str, boxes: &[(u32, u32, u32, u32)]) -> PathBuf {
        let page = RgbImage::from_pixel(160, 100, Rgb([245, 245, 245]));
        let path = self.path(&format!("pages/{}.png", name));
        page.save(&path).unwrap();

        let mut mask = GrayImage::new(160, 100);
        for &(x, y, width, height) in boxes {
            for py in y..y + height {
                for px in x..x + width {
                    mask.put_pixel(px, py, Luma([255]));
                }
            }
        }
        mask.save(self.path(&format!("masks/{}_mask.png", name))).unwrap();
        path
    }

    fn pipeline(
        &self,
        recognizer: Box<dyn TextRecognizer>,
        translator: Box<dyn TranslationBackend>,
        inpainter: Box<dyn Inpainter>,
    ) -> Pipeline {
        let options = PipelineOptions {
            dilation_iterations: 0,
            ..PipelineOptions::default()
        };
        Pipeline::new(
            Collaborators {
                segmenter: Box::new(MaskFileSegmenter::new(self.path("masks"))),
                recognizer,
                translator,
                inpainter,
            },
            options,
        )
        .with_progress(Box::new(NoProgress))
    }
}

fn typesetter() -> Typesetter {
    Typesetter::estimated(15, 8)
}

#[tokio::test]
async fn batch_runs_every_stage_and_packages_pages() {
    let fixture = Fixture::new();
    let pages = vec![
        fixture.add_page("p1", &[(10, 10, 60, 30), (90, 50, 50, 30)]),
        fixture.add_page("p2", &[(20, 20, 80, 40)]),
    ];
    let translator = RecordingTranslator::default();
    let calls = translator.calls.clone();
    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(translator),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &pages).unwrap();
    let archive = fixture.path("out/translated.zip");

    let summary = pipeline
        .run(&mut batch, None, &typesetter(), &archive)
        .await
        .unwrap();

    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.stage, Stage::Packaged);
    assert_eq!(summary.archive.as_deref(), Some(archive.as_path()));
    assert!(archive.is_file());
    assert!(fixture.work_dir().join("translated/p1.png").is_file());
    assert!(fixture.work_dir().join("translated/p2.png").is_file());

    let page = batch.page("p1").unwrap();
    assert_eq!(page.regions.len(), 2);
    assert_eq!(page.injected, 2);
    assert_eq!(page.translations, vec!["LINE 10", "LINE 10"]);

    let calls = calls.lock().unwrap();
    let mut priors: Vec<usize> = calls.iter().map(|(_, prior)| *prior).collect();
    priors.sort();
    assert_eq!(priors, vec![0, 0, 1]);
}

#[tokio::test]
async fn page_without_mask_fails_alone() {
    let fixture = Fixture::new();
    let p1 = fixture.add_page("p1", &[(10, 10, 60, 30)]);
    let p2 = fixture.path("pages/p2.png");
    RgbImage::new(160, 100).save(&p2).unwrap();

    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &[p1, p2]).unwrap();
    let summary = pipeline
        .run(&mut batch, None, &typesetter(), &fixture.path("out.zip"))
        .await
        .unwrap();

    assert!(!summary.all_failed());
    let failure = summary.pages[1].failure.clone().unwrap();
    assert_eq!(failure.stage, Stage::Detecting);
    assert!(summary.pages[0].output.is_some());
    assert!(summary.pages[1].output.is_none());
}

#[tokio::test]
async fn pages_load_concurrently_and_bad_files_fail_alone() {
    let fixture = Fixture::new();
    let good = fixture.add_page("good", &[(10, 10, 60, 30)]);
    let broken = fixture.path("pages/broken.png");
    fs::write(&broken, b"not a png").unwrap();
    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &[broken, good]).unwrap();

    pipeline.detect(&mut batch).await.unwrap();

    let failure = batch.page("broken").unwrap().failure.clone().unwrap();
    assert_eq!(failure.stage, Stage::Detecting);
    assert!(failure.message.contains("failed to open page"));
    let good = batch.page("good").unwrap();
    assert!(good.failure.is_none());
    assert_eq!(good.source.as_ref().map(|image| image.dimensions()), Some((160, 100)));
    assert!(fixture.work_dir().join("segmentation/good/good.png").is_file());
}

#[tokio::test]
async fn misaligned_recognizer_output_fails_the_page() {
    let fixture = Fixture::new();
    let pages = vec![fixture.add_page("p1", &[(10, 10, 60, 30)])];
    let pipeline = fixture.pipeline(
        Box::new(ShortRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &pages).unwrap();

    pipeline.detect(&mut batch).await.unwrap();
    pipeline.recognize(&mut batch).await.unwrap();

    let failure = batch.page("p1").unwrap().failure.clone().unwrap();
    assert_eq!(failure.stage, Stage::Recognizing);
    assert!(failure.message.contains("0 text(s) for 1 region(s)"));
}

#[tokio::test]
async fn inpainting_failure_fails_every_live_page() {
    let fixture = Fixture::new();
    let pages = vec![
        fixture.add_page("p1", &[(10, 10, 60, 30)]),
        fixture.add_page("p2", &[(10, 10, 60, 30)]),
    ];
    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(BrokenInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &pages).unwrap();
    let summary = pipeline
        .run(&mut batch, None, &typesetter(), &fixture.path("out.zip"))
        .await
        .unwrap();

    assert!(summary.all_failed());
    assert!(summary.archive.is_none());
    assert!(
        summary
            .pages
            .iter()
            .all(|page| page.failure.as_ref().map(|failure| failure.stage) == Some(Stage::Inpainting))
    );
}

#[tokio::test]
async fn operator_edits_keep_matched_regions_and_add_drawn_ones() {
    let fixture = Fixture::new();
    let pages = vec![fixture.add_page("p1", &[(10, 10, 40, 20), (100, 10, 30, 20)])];
    fs::write(
        fixture.path("edits/p1.json"),
        r#"{"version":"4.4.0","objects":[
            {"type":"rect","left":11,"top":10,"width":40,"height":20,"scaleX":1,"scaleY":1},
            {"type":"rect","left":70,"top":60,"width":10,"height":10,"scaleX":2,"scaleY":1}
        ]}"#,
    )
    .unwrap();

    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &pages).unwrap();
    let summary = pipeline
        .run(&mut batch, Some(&fixture.path("edits")), &typesetter(), &fixture.path("out.zip"))
        .await
        .unwrap();

    assert_eq!(summary.pages[0].edit_rounds, 1);
    let regions =
        read_region_list(&fixture.work_dir().join("segmentation/p1/p1_regions.json")).unwrap();
    assert_snapshot!(
        serde_json::to_string(&regions).unwrap(),
        @r#"[{"left":10,"top":10,"width":40,"height":20},{"left":70,"top":60,"width":20,"height":10}]"#
    );
}

#[tokio::test]
async fn rejected_region_inside_a_kept_box_stays_gone() {
    let fixture = Fixture::new();
    // L-shaped bubble spanning (10,10)-(50,50) with a separate blob in its corner.
    let pages = vec![fixture.add_page("p1", &[(10, 10, 40, 8), (10, 10, 8, 40), (30, 30, 8, 8)])];
    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &pages).unwrap();
    pipeline.detect(&mut batch).await.unwrap();
    assert_eq!(
        batch.page("p1").unwrap().regions.as_slice(),
        &[Rect::new(10, 10, 40, 40), Rect::new(30, 30, 8, 8)]
    );

    let outcome = pipeline
        .apply_edits(&mut batch, "p1", &[OperatorRect::new(10.0, 10.0, 40.0, 40.0)])
        .unwrap();
    assert_eq!(outcome.remaining.as_slice(), &[Rect::new(30, 30, 8, 8)]);

    assert_eq!(pipeline.redetect(&mut batch, "p1", 0).unwrap(), 1);
    let page = batch.page("p1").unwrap();
    assert_eq!(page.regions.as_slice(), &[Rect::new(10, 10, 40, 40)]);
    let mask = page.mask.as_ref().unwrap();
    assert_eq!(mask.get_pixel(12, 12)[0], 255);
    assert_eq!(mask.get_pixel(33, 33)[0], 0);
}

#[tokio::test]
async fn stages_cannot_be_skipped() {
    let fixture = Fixture::new();
    let pages = vec![fixture.add_page("p1", &[(10, 10, 60, 30)])];
    let pipeline = fixture.pipeline(
        Box::new(NumberedRecognizer),
        Box::new(RecordingTranslator::default()),
        Box::new(CopyInpainter),
    );
    let mut batch = BatchState::new(&fixture.work_dir(), &pages).unwrap();

    let err = pipeline.translate(&mut batch).await.unwrap_err();
    assert_snapshot!(err.to_string(), @"cannot move batch from detecting to translating");
}

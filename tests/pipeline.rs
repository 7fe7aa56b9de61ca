// 端到端的检测与裁剪流程

mod common;

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use common::{FailingBackend, ScriptedBackend, candidate, raw_output, solid_image};
use shanan_cropper::{
  crop::select_crop,
  input::{DEFAULT_EXTENSIONS, DirectoryInput, ImageFileInput},
  model::{DecodeConfig, DetectError, DocumentDetector},
  output::{DirectoryOutput, SaveImageFileOutput},
  task::{BatchCropTask, BatchOutcome, OneShotCropTask, Task},
};

#[test]
fn landscape_scan_maps_back_to_original_pixels() {
  // 1280x960 -> scale 0.5, pad_y 80
  let backend = ScriptedBackend::always(&[candidate(320.0, 320.0, 200.0, 300.0, 73, 0.9)]);
  let detector = DocumentDetector::new(backend);
  let image = solid_image(1280, 960);

  let items = detector.run_detection(&image).unwrap();
  assert_eq!(items.len(), 1);
  let bbox = items[0].bbox;
  let expected = [440.0, 180.0, 840.0, 780.0];
  for (got, want) in bbox.iter().zip(expected) {
    assert!((got - want).abs() < 1e-3, "{:?} != {:?}", bbox, expected);
  }
  assert_eq!(items[0].label(), "book");
  assert_eq!(detector.backend().calls(), vec![(640, 640)]);

  let (cropped, was_cropped) = detector.crop_document(&image).unwrap();
  assert!(was_cropped);
  assert_eq!(cropped.dimensions(), (420, 620));
  // 裁剪结果左上角对应原图 (430, 170)
  assert_eq!(cropped.get_pixel(0, 0), image.get_pixel(430, 170));
}

#[test]
fn people_are_never_cropped() {
  let backend = ScriptedBackend::always(&[
    candidate(320.0, 320.0, 600.0, 600.0, 0, 0.99),
    candidate(100.0, 100.0, 40.0, 40.0, 67, 0.3),
  ]);
  let detector = DocumentDetector::new(backend);
  let items = detector.run_detection(&solid_image(640, 640)).unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].class_id, 67);

  let (rect, found) = select_crop(&items, 640, 640, 10);
  assert!(found);
  assert_eq!((rect.x1, rect.y1, rect.x2, rect.y2), (70, 70, 130, 130));
}

#[test]
fn person_filter_can_be_disabled() {
  let backend = ScriptedBackend::always(&[candidate(320.0, 320.0, 100.0, 100.0, 0, 0.99)]);
  let detector = DocumentDetector::new(backend).with_decode_config(DecodeConfig {
    excluded_classes: Vec::new(),
    ..DecodeConfig::default()
  });
  let items = detector.run_detection(&solid_image(640, 640)).unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].label(), "person");
}

#[test]
fn box_in_padding_passes_original_through() {
  // 640x320 的 letterbox 上下各 160 的填充区域
  let backend = ScriptedBackend::always(&[candidate(320.0, 50.0, 100.0, 60.0, 73, 0.9)]);
  let detector = DocumentDetector::new(backend).with_margin(0);
  let image = solid_image(640, 320);

  let items = detector.run_detection(&image).unwrap();
  assert_eq!(items.len(), 1);
  let bbox = items[0].bbox;
  assert!(bbox.iter().all(|v| v.is_finite()));
  assert!(bbox[1] >= 0.0 && bbox[3] <= 320.0);

  let (result, was_cropped) = detector.crop_document(&image).unwrap();
  assert!(!was_cropped);
  assert_eq!(result, image);
}

#[test]
fn backend_failure_is_not_an_empty_result() {
  let detector = DocumentDetector::new(FailingBackend);
  let err = detector.crop_document(&solid_image(32, 32)).unwrap_err();
  assert!(matches!(err, DetectError::Backend(_)));
}

#[test]
fn oneshot_task_writes_cropped_file() {
  let dir = tempfile::tempdir().unwrap();
  let input_path = dir.path().join("scan.png");
  solid_image(640, 640).save(&input_path).unwrap();

  let backend = ScriptedBackend::always(&[candidate(320.0, 320.0, 200.0, 100.0, 73, 0.9)]);
  let detector = DocumentDetector::new(backend);
  let output_path = dir.path().join("out/scan_cropped.png");

  let report = OneShotCropTask
    .run_task(
      ImageFileInput::open(&input_path).unwrap(),
      &detector,
      SaveImageFileOutput::new(&output_path),
    )
    .unwrap();

  assert!(report.cropped);
  assert_eq!((report.width, report.height), (220, 120));
  assert_eq!(report.output, output_path);
  let saved = image::open(&output_path).unwrap();
  assert_eq!((saved.width(), saved.height()), (220, 120));
}

#[test]
fn batch_task_reports_each_file() {
  let dir = tempfile::tempdir().unwrap();
  solid_image(640, 640).save(dir.path().join("a.png")).unwrap();
  solid_image(320, 200).save(dir.path().join("b.png")).unwrap();
  std::fs::write(dir.path().join("c.jpg"), b"not a jpeg").unwrap();
  std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

  // a.png 有文档，b.png 没有；c.jpg 解码失败不会调用后端
  let backend = ScriptedBackend::new(vec![
    raw_output(&[candidate(320.0, 320.0, 200.0, 100.0, 73, 0.9)]),
    raw_output(&[]),
  ]);
  let detector = DocumentDetector::new(backend);
  let input = DirectoryInput::open(dir.path(), &DEFAULT_EXTENSIONS).unwrap();
  assert_eq!(input.len(), 3);

  let summary = BatchCropTask::default()
    .run_task(input, &detector, None)
    .unwrap();

  assert_eq!(
    summary.to_string(),
    "Batch complete: 1 cropped, 1 no-detection, 1 failed"
  );
  assert!(!summary.interrupted);
  assert_eq!(summary.entries[0].outcome, BatchOutcome::Cropped);
  assert_eq!(summary.entries[1].outcome, BatchOutcome::NoDetection);
  assert!(matches!(summary.entries[2].outcome, BatchOutcome::Failed(_)));
  assert_eq!(detector.backend().calls().len(), 2);

  let cropped = image::open(dir.path().join("a_cropped.png")).unwrap();
  assert_eq!((cropped.width(), cropped.height()), (220, 120));
  let passed = image::open(dir.path().join("b_cropped.png")).unwrap();
  assert_eq!((passed.width(), passed.height()), (320, 200));
  assert!(!dir.path().join("c_cropped.jpg").exists());
}

#[test]
fn batch_task_writes_into_output_directory() {
  let dir = tempfile::tempdir().unwrap();
  let input_dir = dir.path().join("in");
  std::fs::create_dir(&input_dir).unwrap();
  solid_image(100, 100).save(input_dir.join("page.png")).unwrap();

  let detector = DocumentDetector::new(ScriptedBackend::always(&[]));
  let input = DirectoryInput::open(&input_dir, &DEFAULT_EXTENSIONS).unwrap();
  let output = DirectoryOutput::create(dir.path().join("out")).unwrap();

  let summary = BatchCropTask::default()
    .run_task(input, &detector, Some(output))
    .unwrap();
  assert_eq!(summary.no_detection(), 1);
  assert!(dir.path().join("out/page.png").is_file());
}

#[test]
fn batch_task_stops_when_flag_is_set() {
  let dir = tempfile::tempdir().unwrap();
  solid_image(10, 10).save(dir.path().join("a.png")).unwrap();
  solid_image(10, 10).save(dir.path().join("b.png")).unwrap();

  let stop = Arc::new(AtomicBool::new(false));
  stop.store(true, Ordering::SeqCst);

  let detector = DocumentDetector::new(ScriptedBackend::always(&[]));
  let input = DirectoryInput::open(dir.path(), &DEFAULT_EXTENSIONS).unwrap();
  let summary = BatchCropTask::default()
    .with_stop_flag(stop)
    .run_task(input, &detector, None)
    .unwrap();

  assert!(summary.interrupted);
  assert!(summary.entries.is_empty());
  assert!(detector.backend().calls().is_empty());
}

fn main() {
    // PDFium is bound at runtime (./, vendor/pdfium/lib/, then system paths)
    // and tesseract is invoked as a subprocess, so nothing is linked here.
    println!("cargo:rerun-if-changed=build.rs");
}

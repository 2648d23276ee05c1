//! Hand-built documents for tests in this and dependent crates.

/// Builds a minimal PDF whose pages are each `200x100` points with one black square.
pub fn sample_pdf(page_count: usize) -> Vec<u8> {
    let contents = vec!["0 0 0 rg 10 10 50 50 re f\n"; page_count];
    build(&contents, "", &[])
}

/// One `200x100` page exercising colors, clipping, images and an oversized stroke.
///
/// - blue square at `(10, 10)-(60, 60)`
/// - 2x2 red image scaled to `(100, 20)-(150, 70)`
/// - green band `y` in `80..95`, clipped to `x` in `160..190`
/// - black stroke along `y = 5` running a billion points past both page edges
pub fn painted_pdf() -> Vec<u8> {
    let content = concat!(
        "0 0 1 rg 10 10 50 50 re f\n",
        "q 50 0 0 50 100 20 cm /Im0 Do Q\n",
        "q 160 0 30 100 re W n 0 1 0 rg 0 80 200 15 re f Q\n",
        "0 G 1 w -1000000000 5 m 1000000000 5 l S\n",
    );
    // Objects 1-4 are the catalog, page tree, page and content stream.
    let image = stream(
        "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB \
         /BitsPerComponent 8 /Filter /ASCIIHexDecode",
        "FF0000FF0000FF0000FF0000>\n",
    );
    build(&[content], "/XObject << /Im0 5 0 R >>", &[image])
}

fn stream(dictionary: &str, data: &str) -> String {
    format!(
        "<< {dictionary} /Length {} >>\nstream\n{data}endstream",
        data.len()
    )
}

/// Lays out catalog, page tree, pages, content streams, then `extra_objects` in that order.
fn build(contents: &[&str], resources: &str, extra_objects: &[String]) -> Vec<u8> {
    let page_count = contents.len();
    let first_page_obj = 3;
    let first_content_obj = first_page_obj + page_count;

    let kids = (0..page_count)
        .map(|index| format!("{} 0 R", first_page_obj + index))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"),
    ];
    for index in 0..page_count {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] /Resources << {resources} >> \
             /Contents {} 0 R >>",
            first_content_obj + index
        ));
    }
    objects.extend(contents.iter().map(|content| stream("", content)));
    objects.extend(extra_objects.iter().cloned());

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

//! User-facing texts. Placeholders in braces (`{time}`, `{name}`, `{count}`,
//! `{max}`) are substituted by the callers with `str::replace`.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Lang {
    #[default]
    En,
    Id,
    Ar,
    Jv,
}

impl Lang {
    /// Picks a language from the gateway's language code, English otherwise.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(c) if c.starts_with("id") => Lang::Id,
            Some(c) if c.starts_with("ar") => Lang::Ar,
            Some(c) if c.starts_with("jv") => Lang::Jv,
            _ => Lang::En,
        }
    }

    pub fn texts(self) -> &'static Texts {
        match self {
            Lang::En => &EN,
            Lang::Id => &ID,
            Lang::Ar => &AR,
            Lang::Jv => &JV,
        }
    }
}

pub struct Texts {
    pub first_welcome: &'static str,
    pub start_button: &'static str,
    pub welcome: &'static str,
    pub choose_service: &'static str,
    pub svc_convert: &'static str,
    pub svc_compress: &'static str,
    pub svc_audio: &'static str,
    pub svc_zip: &'static str,
    pub svc_merge: &'static str,
    pub back_to_menu: &'static str,
    pub send_file: &'static str,
    pub file_received: &'static str,
    pub convert_jpg: &'static str,
    pub convert_png: &'static str,
    pub convert_webp: &'static str,
    pub compress_img: &'static str,
    pub compress_pdf: &'static str,
    pub extract_mp3: &'static str,
    pub zip_file: &'static str,
    pub countdown: &'static str,
    pub session_expired: &'static str,
    pub inactivity_reminder: &'static str,
    pub inactivity_close: &'static str,
    pub processing: &'static str,
    pub done: &'static str,
    pub complete: &'static str,
    pub help_more: &'static str,
    pub yes_more: &'static str,
    pub no_thanks: &'static str,
    pub goodbye: &'static str,
    pub ready_next: &'static str,
    pub conversion_failed: &'static str,
    pub corrupted_file: &'static str,
    pub wrong_file_type: &'static str,
    pub rate_limited: &'static str,
    pub file_too_large: &'static str,
    pub file_not_found: &'static str,
    pub invalid_action: &'static str,
    pub merge_intro: &'static str,
    pub merge_added: &'static str,
    pub merge_need_more: &'static str,
    pub merge_order: &'static str,
    pub merge_execute: &'static str,
    pub merge_cancel: &'static str,
    pub merge_cancelled: &'static str,
    pub merge_expired: &'static str,
    pub merge_insufficient: &'static str,
    pub merge_full: &'static str,
    pub merging: &'static str,
}

static EN: Texts = Texts {
    first_welcome: "👋 Hi there! Tap the button below to get started.",
    start_button: "🚀 Start",
    welcome: "🎉 Hi! I'm RupaGanti by Grands, I can help you convert or compress your files!\n\n✨ What I can do:\n📸 Images: JPG ↔ PNG ↔ WebP ↔ BMP\n📄 Documents: PDF compression and merging\n🎵 Audio: extract MP3 from videos\n🗜️ Compress: reduce file size\n\n🔒 Files are encrypted and deleted automatically after a few minutes.",
    choose_service: "What would you like to do?",
    svc_convert: "🔄 Convert Image",
    svc_compress: "🗜️ Compress File",
    svc_audio: "🎵 Extract Audio",
    svc_zip: "📦 Create ZIP",
    svc_merge: "📑 Merge PDFs",
    back_to_menu: "↩️ Main Menu",
    send_file: "📁 Send me your file now.",
    file_received: "📁 {name} received!\n\nChoose what you'd like to do:",
    convert_jpg: "📷 Convert to JPG",
    convert_png: "🖼️ Convert to PNG",
    convert_webp: "🌐 Convert to WebP",
    compress_img: "🗜️ Compress Image",
    compress_pdf: "🗜️ Compress PDF",
    extract_mp3: "🎵 Extract Audio (MP3)",
    zip_file: "📦 Compress to ZIP",
    countdown: "⏳ Choose an action within {time}",
    session_expired: "⌛ Time's up! Your file was deleted for your privacy. Tap below to start again.",
    inactivity_reminder: "👀 Still there? Send a file or pick an option to continue.",
    inactivity_close: "💤 Session closed due to inactivity. Tap below whenever you want to continue.",
    processing: "⚙️ Processing your file...",
    done: "✅ Done!",
    complete: "🎁 This is what you've been waiting for!",
    help_more: "💬 Need anything else? I'm here to help, just say the word!",
    yes_more: "✅ Yes, Process Another",
    no_thanks: "❌ No, Thanks!",
    goodbye: "👋 Thanks for using RupaGanti! Type /start anytime to use me again.",
    ready_next: "📁 Ready for your next file! Just send it to me.",
    conversion_failed: "❌ Conversion failed. Please start again.",
    corrupted_file: "⚠️ Your file could not be read back and was deleted. Please upload it again.",
    wrong_file_type: "🚫 That file type doesn't fit the selected option. Please send another file.",
    rate_limited: "🛑 Too many requests. Please slow down.",
    file_too_large: "📦 That file is too large (max {max} MB).",
    file_not_found: "❌ File not found!",
    invalid_action: "❌ Invalid action!",
    merge_intro: "📑 Send me the PDF files you want to merge (2 to {max}). I'll show the order once you stop sending.",
    merge_added: "📄 Added file #{count}.",
    merge_need_more: "📄 Send at least one more PDF to merge.",
    merge_order: "📑 Merge order (use the arrows to reorder):",
    merge_execute: "✅ Merge Now",
    merge_cancel: "❌ Cancel",
    merge_cancelled: "🗑️ Merge cancelled and files deleted.",
    merge_expired: "⌛ Your merge session expired and the files were deleted.",
    merge_insufficient: "📄 You need at least 2 PDFs to merge.",
    merge_full: "📚 This merge already has the maximum of {max} files.",
    merging: "⚙️ Merging your PDFs...",
};

static ID: Texts = Texts {
    first_welcome: "👋 Hai! Ketuk tombol di bawah untuk memulai.",
    start_button: "🚀 Mulai",
    welcome: "🎉 Hai! Saya RupaGanti by Grands, saya bisa membantu mengkonversi atau mengompres file Anda!\n\n✨ Yang bisa saya lakukan:\n📸 Gambar: JPG ↔ PNG ↔ WebP ↔ BMP\n📄 Dokumen: kompresi dan penggabungan PDF\n🎵 Audio: ekstrak MP3 dari video\n🗜️ Kompres: kurangi ukuran file\n\n🔒 File dienkripsi dan dihapus otomatis setelah beberapa menit.",
    choose_service: "Apa yang ingin Anda lakukan?",
    svc_convert: "🔄 Konversi Gambar",
    svc_compress: "🗜️ Kompres File",
    svc_audio: "🎵 Ekstrak Audio",
    svc_zip: "📦 Buat ZIP",
    svc_merge: "📑 Gabung PDF",
    back_to_menu: "↩️ Menu Utama",
    send_file: "📁 Kirim file Anda sekarang.",
    file_received: "📁 {name} diterima!\n\nPilih yang ingin Anda lakukan:",
    convert_jpg: "📷 Konversi ke JPG",
    convert_png: "🖼️ Konversi ke PNG",
    convert_webp: "🌐 Konversi ke WebP",
    compress_img: "🗜️ Kompres Gambar",
    compress_pdf: "🗜️ Kompres PDF",
    extract_mp3: "🎵 Ekstrak Audio (MP3)",
    zip_file: "📦 Kompres ke ZIP",
    countdown: "⏳ Pilih tindakan dalam {time}",
    session_expired: "⌛ Waktu habis! File Anda dihapus demi privasi. Ketuk di bawah untuk memulai lagi.",
    inactivity_reminder: "👀 Masih di sana? Kirim file atau pilih opsi untuk melanjutkan.",
    inactivity_close: "💤 Sesi ditutup karena tidak ada aktivitas. Ketuk di bawah kapan saja untuk melanjutkan.",
    processing: "⚙️ Memproses file Anda...",
    done: "✅ Selesai!",
    complete: "🎁 Inilah yang sudah Anda tunggu!",
    help_more: "💬 Butuh bantuan lagi? Saya siap membantu, tinggal bilang saja!",
    yes_more: "✅ Ya, Proses Lagi",
    no_thanks: "❌ Tidak, Terima Kasih!",
    goodbye: "👋 Terima kasih telah menggunakan RupaGanti! Ketik /start kapan saja untuk menggunakan saya lagi.",
    ready_next: "📁 Siap untuk file berikutnya! Kirim saja ke saya.",
    conversion_failed: "❌ Konversi gagal. Silakan mulai lagi.",
    corrupted_file: "⚠️ File Anda tidak dapat dibaca dan telah dihapus. Silakan unggah ulang.",
    wrong_file_type: "🚫 Jenis file tidak sesuai dengan opsi yang dipilih. Silakan kirim file lain.",
    rate_limited: "🛑 Terlalu banyak permintaan. Mohon pelan-pelan.",
    file_too_large: "📦 File terlalu besar (maks {max} MB).",
    file_not_found: "❌ File tidak ditemukan!",
    invalid_action: "❌ Tindakan tidak valid!",
    merge_intro: "📑 Kirim file PDF yang ingin digabung (2 sampai {max}). Saya akan menampilkan urutannya setelah Anda selesai mengirim.",
    merge_added: "📄 File #{count} ditambahkan.",
    merge_need_more: "📄 Kirim setidaknya satu PDF lagi untuk digabung.",
    merge_order: "📑 Urutan penggabungan (gunakan panah untuk mengatur urutan):",
    merge_execute: "✅ Gabung Sekarang",
    merge_cancel: "❌ Batal",
    merge_cancelled: "🗑️ Penggabungan dibatalkan dan file dihapus.",
    merge_expired: "⌛ Sesi penggabungan Anda kedaluwarsa dan file telah dihapus.",
    merge_insufficient: "📄 Anda memerlukan setidaknya 2 PDF untuk digabung.",
    merge_full: "📚 Penggabungan ini sudah mencapai maksimum {max} file.",
    merging: "⚙️ Menggabungkan PDF Anda...",
};

static AR: Texts = Texts {
    first_welcome: "👋 مرحبا! اضغط على الزر أدناه للبدء.",
    start_button: "🚀 ابدأ",
    welcome: "🎉 مرحبا! أنا RupaGanti من Grands, يمكنني مساعدتك في تحويل أو ضغط ملفاتك!\n\n✨ ما يمكنني فعله:\n📸 الصور: JPG ↔ PNG ↔ WebP ↔ BMP\n📄 المستندات: ضغط ودمج PDF\n🎵 الصوت: استخراج MP3 من الفيديو\n🗜️ الضغط: تقليل حجم الملف\n\n🔒 يتم تشفير الملفات وحذفها تلقائيا بعد بضع دقائق.",
    choose_service: "ماذا تريد أن تفعل؟",
    svc_convert: "🔄 تحويل صورة",
    svc_compress: "🗜️ ضغط ملف",
    svc_audio: "🎵 استخراج الصوت",
    svc_zip: "📦 إنشاء ZIP",
    svc_merge: "📑 دمج PDF",
    back_to_menu: "↩️ القائمة الرئيسية",
    send_file: "📁 أرسل ملفك الآن.",
    file_received: "📁 {name} تم الاستلام!\n\nاختر ما تريد فعله:",
    convert_jpg: "📷 تحويل إلى JPG",
    convert_png: "🖼️ تحويل إلى PNG",
    convert_webp: "🌐 تحويل إلى WebP",
    compress_img: "🗜️ ضغط الصورة",
    compress_pdf: "🗜️ ضغط PDF",
    extract_mp3: "🎵 استخراج الصوت (MP3)",
    zip_file: "📦 ضغط إلى ZIP",
    countdown: "⏳ اختر إجراء خلال {time}",
    session_expired: "⌛ انتهى الوقت! تم حذف ملفك حفاظا على خصوصيتك. اضغط أدناه للبدء من جديد.",
    inactivity_reminder: "👀 هل ما زلت هنا؟ أرسل ملفا أو اختر خيارا للمتابعة.",
    inactivity_close: "💤 تم إغلاق الجلسة بسبب عدم النشاط. اضغط أدناه متى شئت للمتابعة.",
    processing: "⚙️ جاري معالجة ملفك...",
    done: "✅ تم!",
    complete: "🎁 هذا ما كنت تنتظره!",
    help_more: "💬 تحتاج شيئاً آخر؟ أنا هنا للمساعدة, فقط قل كلمة!",
    yes_more: "✅ نعم، معالجة أخرى",
    no_thanks: "❌ لا، شكراً!",
    goodbye: "👋 شكراً لاستخدام RupaGanti! اكتب /start في أي وقت لاستخدامي مرة أخرى.",
    ready_next: "📁 جاهز لملفك التالي! أرسله لي فقط.",
    conversion_failed: "❌ فشل التحويل. يرجى البدء من جديد.",
    corrupted_file: "⚠️ تعذرت قراءة ملفك وتم حذفه. يرجى رفعه مرة أخرى.",
    wrong_file_type: "🚫 نوع الملف لا يناسب الخيار المحدد. يرجى إرسال ملف آخر.",
    rate_limited: "🛑 طلبات كثيرة جدا. يرجى التمهل.",
    file_too_large: "📦 الملف كبير جدا (الحد الأقصى {max} ميغابايت).",
    file_not_found: "❌ الملف غير موجود!",
    invalid_action: "❌ إجراء غير صالح!",
    merge_intro: "📑 أرسل ملفات PDF التي تريد دمجها (من 2 إلى {max}). سأعرض الترتيب عندما تتوقف عن الإرسال.",
    merge_added: "📄 تمت إضافة الملف رقم {count}.",
    merge_need_more: "📄 أرسل ملف PDF واحدا آخر على الأقل للدمج.",
    merge_order: "📑 ترتيب الدمج (استخدم الأسهم لإعادة الترتيب):",
    merge_execute: "✅ ادمج الآن",
    merge_cancel: "❌ إلغاء",
    merge_cancelled: "🗑️ تم إلغاء الدمج وحذف الملفات.",
    merge_expired: "⌛ انتهت جلسة الدمج وتم حذف الملفات.",
    merge_insufficient: "📄 تحتاج إلى ملفي PDF على الأقل للدمج.",
    merge_full: "📚 وصل هذا الدمج إلى الحد الأقصى وهو {max} ملفات.",
    merging: "⚙️ جاري دمج ملفات PDF...",
};

static JV: Texts = Texts {
    first_welcome: "👋 Halo! Tutul tombol ing ngisor kanggo miwiti.",
    start_button: "🚀 Miwiti",
    welcome: "🎉 Halo! Aku RupaGanti saka Grands, aku bisa ngewangi ngowahi utawa ngompres file sampeyan!\n\n✨ Sing bisa tak lakoni:\n📸 Gambar: JPG ↔ PNG ↔ WebP ↔ BMP\n📄 Dokumen: kompresi lan nggabung PDF\n🎵 Audio: njupuk MP3 saka video\n🗜️ Kompres: ngurangi ukuran file\n\n🔒 File dienkripsi lan dibusak otomatis sawise sawetara menit.",
    choose_service: "Arep nglakoni apa?",
    svc_convert: "🔄 Owahi Gambar",
    svc_compress: "🗜️ Kompres File",
    svc_audio: "🎵 Jupuk Audio",
    svc_zip: "📦 Gawe ZIP",
    svc_merge: "📑 Gabung PDF",
    back_to_menu: "↩️ Menu Utama",
    send_file: "📁 Kirimno file sampeyan saiki.",
    file_received: "📁 {name} wis ditampa!\n\nPilih sing arep dilakoni:",
    convert_jpg: "📷 Owahi dadi JPG",
    convert_png: "🖼️ Owahi dadi PNG",
    convert_webp: "🌐 Owahi dadi WebP",
    compress_img: "🗜️ Kompres Gambar",
    compress_pdf: "🗜️ Kompres PDF",
    extract_mp3: "🎵 Jupuk Audio (MP3)",
    zip_file: "📦 Kompres dadi ZIP",
    countdown: "⏳ Pilih tumindak sajrone {time}",
    session_expired: "⌛ Wektune entek! File sampeyan wis dibusak. Tutul ing ngisor kanggo miwiti maneh.",
    inactivity_reminder: "👀 Isih ana? Kirim file utawa pilih opsi kanggo nerusake.",
    inactivity_close: "💤 Sesi ditutup amarga ora ana aktivitas. Tutul ing ngisor yen arep nerusake.",
    processing: "⚙️ Lagi ngolah file sampeyan...",
    done: "✅ Rampung!",
    complete: "🎁 Iki sing wis kokenteni!",
    help_more: "💬 Butuh apa maneh? Aku kene kanggo ngewangi, cukup kandha wae!",
    yes_more: "✅ Ya, Proses Maneh",
    no_thanks: "❌ Ora, Matur Nuwun!",
    goodbye: "👋 Matur nuwun wis nggunakake RupaGanti! Ketik /start kapan wae kanggo nggunakake aku maneh.",
    ready_next: "📁 Siap kanggo file sabanjure! Kirimno wae marang aku.",
    conversion_failed: "❌ Konversi gagal. Mangga miwiti maneh.",
    corrupted_file: "⚠️ File sampeyan ora bisa diwaca lan wis dibusak. Mangga unggah maneh.",
    wrong_file_type: "🚫 Jinis file ora cocog karo opsi sing dipilih. Mangga kirim file liyane.",
    rate_limited: "🛑 Kakehan panjaluk. Mangga alon-alon.",
    file_too_large: "📦 File kegedhen (maks {max} MB).",
    file_not_found: "❌ File ora ditemokake!",
    invalid_action: "❌ Tumindak ora valid!",
    merge_intro: "📑 Kirimno file PDF sing arep digabung (2 nganti {max}). Urutane tak tuduhno yen wis rampung ngirim.",
    merge_added: "📄 File #{count} ditambahake.",
    merge_need_more: "📄 Kirim paling ora siji PDF maneh kanggo digabung.",
    merge_order: "📑 Urutan gabungan (gunakake panah kanggo ngatur urutan):",
    merge_execute: "✅ Gabung Saiki",
    merge_cancel: "❌ Batal",
    merge_cancelled: "🗑️ Gabungan dibatalake lan file dibusak.",
    merge_expired: "⌛ Sesi gabungan wis kadaluwarsa lan file wis dibusak.",
    merge_insufficient: "📄 Butuh paling ora 2 PDF kanggo digabung.",
    merge_full: "📚 Gabungan iki wis tekan maksimal {max} file.",
    merging: "⚙️ Lagi nggabung PDF sampeyan...",
};

/// Remaining time as `M:SS`, rounding partial seconds up.
pub fn format_countdown(remaining: std::time::Duration) -> String {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lang_from_code() {
        assert_eq!(Lang::from_code(Some("id-ID")), Lang::Id);
        assert_eq!(Lang::from_code(Some("ar")), Lang::Ar);
        assert_eq!(Lang::from_code(Some("jv")), Lang::Jv);
        assert_eq!(Lang::from_code(Some("de")), Lang::En);
        assert_eq!(Lang::from_code(None), Lang::En);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::from_secs(120)), "2:00");
        assert_eq!(format_countdown(Duration::from_secs(59)), "0:59");
        assert_eq!(format_countdown(Duration::from_millis(61_200)), "1:02");
        assert_eq!(format_countdown(Duration::ZERO), "0:00");
    }

    #[test]
    fn test_placeholders_present_in_every_language() {
        for lang in [Lang::En, Lang::Id, Lang::Ar, Lang::Jv] {
            let t = lang.texts();
            assert!(t.countdown.contains("{time}"));
            assert!(t.file_received.contains("{name}"));
            assert!(t.merge_added.contains("{count}"));
            assert!(t.merge_full.contains("{max}"));
        }
    }
}

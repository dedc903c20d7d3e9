//! Embeddable viewer pages. The model page loads the artifact into a
//! three.js scene with orbit controls; the video page is a plain player.

pub fn model_viewer_page(model_id: &str) -> String {
    let model_url = format!("/trellis/model/{model_id}");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Trellis 3D Model Viewer</title>
    <script src="https://cdn.jsdelivr.net/npm/three@0.132.2/build/three.min.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/three@0.132.2/examples/js/controls/OrbitControls.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/three@0.132.2/examples/js/loaders/GLTFLoader.js"></script>
    <style>
        body {{ margin: 0; overflow: hidden; background-color: #222; }}
        #viewer {{ width: 100%; height: 100vh; }}
    </style>
</head>
<body>
    <div id="viewer"></div>
    <script>
        const modelUrl = "{model_url}";

        const scene = new THREE.Scene();
        const camera = new THREE.PerspectiveCamera(75, window.innerWidth / window.innerHeight, 0.1, 1000);
        const renderer = new THREE.WebGLRenderer();
        renderer.setSize(window.innerWidth, window.innerHeight);
        document.getElementById('viewer').appendChild(renderer.domElement);

        scene.add(new THREE.AmbientLight(0xffffff, 0.5));
        const directionalLight = new THREE.DirectionalLight(0xffffff, 1);
        directionalLight.position.set(1, 1, 1);
        scene.add(directionalLight);

        const controls = new THREE.OrbitControls(camera, renderer.domElement);
        controls.enableDamping = true;

        const loader = new THREE.GLTFLoader();
        loader.load(modelUrl, (gltf) => {{
            const model = gltf.scene;
            scene.add(model);

            const box = new THREE.Box3().setFromObject(model);
            const center = box.getCenter(new THREE.Vector3());
            const size = box.getSize(new THREE.Vector3());
            const maxDim = Math.max(size.x, size.y, size.z);

            camera.position.set(
                center.x + maxDim * 2,
                center.y + maxDim * 0.5,
                center.z + maxDim * 2
            );
            controls.target.copy(center);
        }});

        function animate() {{
            requestAnimationFrame(animate);
            controls.update();
            renderer.render(scene, camera);
        }}
        animate();
    </script>
</body>
</html>
"#
    )
}

pub fn video_player_page(video_id: &str) -> String {
    let video_url = format!("/trellis/video/{video_id}");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Trellis Video Player</title>
    <style>
        body {{ margin: 0; padding: 0; background-color: #222; }}
        .container {{
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            width: 100%;
        }}
        video {{
            max-width: 100%;
            max-height: 100vh;
            box-shadow: 0 0 20px rgba(0,0,0,0.5);
        }}
    </style>
</head>
<body>
    <div class="container">
        <video controls autoplay loop>
            <source src="{video_url}" type="video/mp4">
            Your browser does not support the video tag.
        </video>
    </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_reference_the_artifact_routes() {
        let html = model_viewer_page("sess-1");
        assert!(html.contains(r#"const modelUrl = "/trellis/model/sess-1";"#));
        assert!(html.contains("GLTFLoader"));

        let html = video_player_page("sess-1");
        assert!(html.contains(r#"src="/trellis/video/sess-1""#));
    }
}
